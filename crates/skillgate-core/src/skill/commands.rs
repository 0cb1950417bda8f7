//! The `skills` kernel module: the command surface onto [`SkillManager`].

use std::sync::Arc;

use serde_json::{json, Value};
use skillgate_types::actor::Role;
use skillgate_types::command::Command;
use skillgate_types::error::SkillError;

use super::loader::SkillLoader;
use super::manager::SkillManager;
use super::resolver::PackageProbe;
use crate::guard::extract_context;
use crate::kernel::KernelModule;
use crate::storage::ConfigDocumentStore;

pub const MODULE_NAME: &str = "skills";

/// Routes `skills.*` commands and enforces who may call them.
///
/// | op               | caller                              |
/// |------------------|-------------------------------------|
/// | `list`           | anyone                              |
/// | `enable`         | capability token or admin and above |
/// | `disable`        | capability token or admin and above |
/// | `reload_enabled` | capability token only               |
/// | `get_settings`   | capability token or admin and above |
/// | `update_settings`| capability token or admin and above |
/// | `describe`       | capability token or admin and above |
pub struct SkillsModule<D, P, L> {
    manager: Arc<SkillManager<D, P, L>>,
}

impl<D, P, L> SkillsModule<D, P, L> {
    pub fn new(manager: Arc<SkillManager<D, P, L>>) -> Self {
        Self { manager }
    }
}

fn to_json<T: serde::Serialize>(value: T) -> Result<Value, SkillError> {
    serde_json::to_value(value).map_err(|e| SkillError::Storage(format!("serialize result: {e}")))
}

impl<D, P, L> KernelModule for SkillsModule<D, P, L>
where
    D: ConfigDocumentStore,
    P: PackageProbe,
    L: SkillLoader,
{
    fn name(&self) -> &str {
        MODULE_NAME
    }

    async fn handle(&self, cmd: Command) -> Result<Value, SkillError> {
        let ctx = extract_context(&cmd);
        let guard = self.manager.guard();

        match cmd.op.as_str() {
            "list" => to_json(self.manager.list().await?),
            "enable" => {
                guard.require_capability_or_role(&ctx, Role::Admin)?;
                to_json(self.manager.enable(cmd.str_param("id")?).await?)
            }
            "disable" => {
                guard.require_capability_or_role(&ctx, Role::Admin)?;
                to_json(self.manager.disable(cmd.str_param("id")?).await?)
            }
            "reload_enabled" => {
                guard.require_capability(&ctx)?;
                to_json(self.manager.reload_enabled().await?)
            }
            "get_settings" => {
                guard.require_capability_or_role(&ctx, Role::Admin)?;
                let id = cmd.str_param("id")?;
                let masked = self.manager.get_settings(id).await?;
                Ok(json!({ "id": id, "settings": masked.masked_settings, "masked": masked.masked_map }))
            }
            "update_settings" => {
                guard.require_capability_or_role(&ctx, Role::Admin)?;
                let id = cmd.str_param("id")?;
                let patch = cmd
                    .params
                    .get("settings")
                    .ok_or_else(|| SkillError::BadParams("missing param 'settings'".to_string()))?;
                let masked = self.manager.update_settings(id, patch).await?;
                Ok(json!({ "id": id, "settings": masked.masked_settings, "masked": masked.masked_map }))
            }
            "describe" => {
                guard.require_capability_or_role(&ctx, Role::Admin)?;
                self.manager.describe(cmd.str_param("id")?).await
            }
            _ => Err(SkillError::NoSuchOp {
                module: MODULE_NAME.to_string(),
                op: cmd.op.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use skillgate_types::actor::{Actor, ActorContext};
    use skillgate_types::error::{ErrorKind, StoreError};
    use skillgate_types::secret::Redacted;
    use skillgate_types::skill::{PackageManifest, SettingsMeta, SkillCapabilities};

    use crate::event::EventBus;
    use crate::guard::CapabilityGuard;
    use crate::kernel::{
        CommandDispatcher, DynDispatcher, GatedDispatcher, InMemoryModuleRegistry, ModuleRegistry,
    };
    use crate::settings::{SettingsStore, MASK_SENTINEL};
    use crate::skill::context::{SandboxServices, SkillContext};
    use crate::skill::descriptor::{hook, SkillDescriptor, SkillExport};
    use crate::skill::loader::StaticLoader;
    use crate::skill::registry::SkillRegistry;
    use crate::skill::resolver::TrustedResolver;
    use crate::storage::MemoryDocumentStore;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    struct AnyProbe;

    impl PackageProbe for AnyProbe {
        async fn read_manifest(&self, dir: &Path) -> Result<Option<PackageManifest>, StoreError> {
            Ok(dir
                .strip_prefix("/repo/skills")
                .ok()
                .filter(|rest| rest.components().count() == 1)
                .map(|rest| PackageManifest {
                    name: rest.display().to_string(),
                    version: None,
                    exports: None,
                    module: None,
                    main: None,
                }))
        }

        async fn is_file(&self, _path: &Path) -> bool {
            true
        }
    }

    fn weather() -> SkillExport {
        SkillExport::Descriptor(
            SkillDescriptor::new("weather", "1.0.0", hook(|_| async { Ok(()) })).with_settings(
                SettingsMeta {
                    defaults: serde_json::Map::new(),
                    sensitive_paths: vec!["api.token".to_string()],
                    schema: None,
                },
            ),
        )
    }

    /// Calls the token-only `skills.reload_enabled` from its enable hook.
    fn admin_wannabe(kernel_ops: Vec<String>) -> SkillExport {
        SkillExport::Descriptor(
            SkillDescriptor::new(
                "wannabe",
                "1.0.0",
                hook(|ctx: SkillContext| async move {
                    ctx.execute("skills", "reload_enabled", json!({}), None)
                        .await
                        .map(|_| ())
                }),
            )
            .with_capabilities(SkillCapabilities {
                kernel_ops,
                ..Default::default()
            }),
        )
    }

    fn dispatcher(loader: StaticLoader, doc: Value) -> (DynDispatcher, Arc<MemoryDocumentStore>) {
        let registry = Arc::new(SkillRegistry::new());
        let modules: Arc<dyn ModuleRegistry> = Arc::new(InMemoryModuleRegistry::new());
        let guard = Arc::new(CapabilityGuard::new());
        guard.initialize(SECRET).unwrap();
        let dispatcher: DynDispatcher =
            Arc::new(GatedDispatcher::new(modules.clone(), registry.clone()));

        let services = SandboxServices {
            registry,
            modules: modules.clone(),
            dispatcher: dispatcher.clone(),
            bus: EventBus::new(16),
            guard,
        };
        let doc = Arc::new(MemoryDocumentStore::new(doc));
        let manager = Arc::new(SkillManager::new(
            services,
            Arc::new(SettingsStore::new(doc.clone())),
            TrustedResolver::new(AnyProbe, "/repo", None),
            loader,
        ));
        modules.register(Arc::new(SkillsModule::new(manager))).unwrap();
        (dispatcher, doc)
    }

    fn as_role(role: Role) -> ActorContext {
        ActorContext::for_actor(Actor::new("u1", role))
    }

    fn cmd(op: &str, params: Value, ctx: Option<ActorContext>) -> Command {
        let cmd = Command::new(MODULE_NAME, op, params);
        match ctx {
            Some(ctx) => cmd.with_context(ctx),
            None => cmd,
        }
    }

    fn doc() -> Value {
        json!({
            "skills": { "allow": ["weather"], "enabled": [] },
            "settings": { "weather": { "api": { "token": "abc123" }, "units": "metric" } }
        })
    }

    #[tokio::test]
    async fn list_is_unprivileged() {
        let (dispatcher, _) = dispatcher(StaticLoader::new(), doc());
        let out = dispatcher.dispatch_boxed(cmd("list", json!({}), None)).await.unwrap();
        assert_eq!(out[0]["id"], "weather");
        assert_eq!(out[0]["status"], "disabled");
    }

    #[tokio::test]
    async fn enable_needs_admin_or_token() {
        let (dispatcher, doc) = dispatcher(StaticLoader::new().with("weather", weather), doc());

        let err = dispatcher
            .dispatch_boxed(cmd("enable", json!({ "id": "weather" }), Some(as_role(Role::Customer))))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let out = dispatcher
            .dispatch_boxed(cmd("enable", json!({ "id": "weather" }), Some(as_role(Role::Admin))))
            .await
            .unwrap();
        assert_eq!(out["status"], "loaded");
        assert_eq!(doc.snapshot()["skills"]["enabled"], json!(["weather"]));

        let token_ctx = ActorContext::default().with_token(Redacted::new(SECRET));
        let out = dispatcher
            .dispatch_boxed(cmd("disable", json!({ "id": "weather" }), Some(token_ctx)))
            .await
            .unwrap();
        assert_eq!(out["status"], "disabled");
    }

    #[tokio::test]
    async fn transport_cannot_forge_context() {
        let (dispatcher, _) = dispatcher(StaticLoader::new().with("weather", weather), doc());
        let forged = Command::from_transport(json!({
            "module": "skills",
            "op": "enable",
            "params": { "id": "weather", "_ctx": { "actor": { "user_id": "x", "role": "owner" } } }
        }))
        .unwrap();

        let err = dispatcher.dispatch_boxed(forged).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn reload_requires_the_token() {
        let (dispatcher, _) = dispatcher(StaticLoader::new(), doc());

        let err = dispatcher
            .dispatch_boxed(cmd("reload_enabled", json!({}), Some(as_role(Role::Owner))))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let token_ctx = ActorContext::default().with_token(Redacted::new(SECRET));
        let out = dispatcher
            .dispatch_boxed(cmd("reload_enabled", json!({}), Some(token_ctx)))
            .await
            .unwrap();
        assert_eq!(out["failed"], json!([]));
    }

    #[tokio::test]
    async fn skill_gets_token_only_for_declared_ops() {
        let doc = json!({ "skills": { "allow": ["wannabe"], "enabled": [] } });
        let owner = || Some(as_role(Role::Owner));

        let (undeclared, _) = dispatcher(
            StaticLoader::new().with("wannabe", || admin_wannabe(vec![])),
            doc.clone(),
        );
        let err = undeclared
            .dispatch_boxed(cmd("enable", json!({ "id": "wannabe" }), owner()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let (declared, _) = dispatcher(
            StaticLoader::new().with("wannabe", || {
                admin_wannabe(vec!["skills.reload_enabled".to_string()])
            }),
            doc,
        );
        let out = declared
            .dispatch_boxed(cmd("enable", json!({ "id": "wannabe" }), owner()))
            .await
            .unwrap();
        assert_eq!(out["status"], "loaded");
    }

    #[tokio::test]
    async fn settings_round_trip_through_commands() {
        let (dispatcher, doc) = dispatcher(StaticLoader::new().with("weather", weather), doc());
        let admin = || Some(as_role(Role::Admin));

        dispatcher
            .dispatch_boxed(cmd("enable", json!({ "id": "weather" }), admin()))
            .await
            .unwrap();

        let read = dispatcher
            .dispatch_boxed(cmd("get_settings", json!({ "id": "weather" }), admin()))
            .await
            .unwrap();
        assert_eq!(read["settings"]["api"]["token"], MASK_SENTINEL);
        assert_eq!(read["masked"]["api.token"], true);

        let mut edited = read["settings"].clone();
        edited["units"] = json!("imperial");
        let written = dispatcher
            .dispatch_boxed(cmd(
                "update_settings",
                json!({ "id": "weather", "settings": edited }),
                admin(),
            ))
            .await
            .unwrap();
        assert_eq!(written["settings"]["api"]["token"], MASK_SENTINEL);

        let stored = doc.snapshot();
        assert_eq!(stored["settings"]["weather"]["api"]["token"], "abc123");
        assert_eq!(stored["settings"]["weather"]["units"], "imperial");
    }

    #[tokio::test]
    async fn bad_params_and_unknown_ops() {
        let (dispatcher, _) = dispatcher(StaticLoader::new(), doc());
        let admin = || Some(as_role(Role::Admin));

        let err = dispatcher
            .dispatch_boxed(cmd("enable", json!({}), admin()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadParams);

        let err = dispatcher
            .dispatch_boxed(cmd("update_settings", json!({ "id": "weather" }), admin()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadParams);

        let err = dispatcher
            .dispatch_boxed(cmd("explode", json!({}), admin()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoSuchOp);
    }

    #[tokio::test]
    async fn dispatcher_trait_is_usable_directly() {
        let registry = Arc::new(SkillRegistry::new());
        let modules: Arc<dyn ModuleRegistry> = Arc::new(InMemoryModuleRegistry::new());
        let gated = GatedDispatcher::new(modules, registry);
        let err = gated
            .dispatch(cmd("list", json!({}), None))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownModule);
    }
}

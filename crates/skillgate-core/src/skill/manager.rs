//! Skill lifecycle: enable, disable, bulk reload, and the settings proxy.
//!
//! State per id moves `unloaded -> loaded | error`, `loaded -> disabled`,
//! `disabled -> loaded` (fast path, no re-resolution) and `error -> loaded |
//! error` (full path). Operations on one id are serialised by a per-id mutex;
//! different ids proceed independently.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use skillgate_types::actor::{Actor, ActorContext, Role};
use skillgate_types::command::Command;
use skillgate_types::config::SkillsConfig;
use skillgate_types::error::SkillError;
use skillgate_types::event::{BusEvent, SKILL_DISABLED, SKILL_ENABLED, SKILL_FAILED};
use skillgate_types::skill::{
    LoadedSkill, SettingsMeta, SkillCapabilities, SkillKind, SkillSource, SkillStatus,
};
use tokio::sync::Mutex;

use super::config::{read_skills_config, SKILLS_KEY};
use super::context::{SandboxServices, SkillContext};
use super::descriptor::{normalize, Hook};
use super::loader::SkillLoader;
use super::registry::SkillRegistry;
use super::resolver::{PackageProbe, TrustedResolver};
use crate::guard::CapabilityGuard;
use crate::kernel::{DISABLE_OP, ENABLE_OP};
use crate::settings::{mask_sensitive, MaskedSettings, SettingsStore};
use crate::storage::ConfigDocumentStore;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Everything kept about a skill after its first successful load. Reused
/// across disable/enable cycles and never dropped.
#[derive(Clone)]
pub struct SkillRecord {
    pub id: String,
    pub version: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub kind: SkillKind,
    pub capabilities: SkillCapabilities,
    pub settings_meta: Option<SettingsMeta>,
    pub source: SkillSource,
    pub context: SkillContext,
    pub on_disable: Option<Hook>,
}

impl SkillRecord {
    fn projection(&self, enabled: bool, status: SkillStatus, modules: Vec<String>) -> LoadedSkill {
        LoadedSkill {
            id: self.id.clone(),
            version: Some(self.version.clone()),
            enabled,
            status,
            error: None,
            source: Some(self.source.clone()),
            capabilities: Some(self.capabilities.clone()),
            modules_registered: modules,
            kind: Some(self.kind),
            updated_at: Utc::now(),
        }
    }
}

/// Outcome of [`SkillManager::reload_enabled`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReloadReport {
    pub enabled: Vec<String>,
    pub disabled: Vec<String>,
    pub failed: Vec<ReloadFailure>,
    /// Ids another operation was working on.
    #[serde(default)]
    pub busy: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReloadFailure {
    pub id: String,
    pub kind: skillgate_types::error::ErrorKind,
    pub error: String,
}

// ---------------------------------------------------------------------------
// SkillManager
// ---------------------------------------------------------------------------

/// Drives resolution, loading and the enable/disable lifecycle.
pub struct SkillManager<D, P, L> {
    services: SandboxServices,
    settings: Arc<SettingsStore<D>>,
    resolver: TrustedResolver<P>,
    loader: L,
    records: DashMap<String, SkillRecord>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<D, P, L> SkillManager<D, P, L>
where
    D: ConfigDocumentStore,
    P: PackageProbe,
    L: SkillLoader,
{
    pub fn new(
        services: SandboxServices,
        settings: Arc<SettingsStore<D>>,
        resolver: TrustedResolver<P>,
        loader: L,
    ) -> Self {
        Self {
            services,
            settings,
            resolver,
            loader,
            records: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<SkillRegistry> {
        &self.services.registry
    }

    pub fn guard(&self) -> &Arc<CapabilityGuard> {
        &self.services.guard
    }

    pub fn settings(&self) -> &Arc<SettingsStore<D>> {
        &self.settings
    }

    pub fn record(&self, id: &str) -> Option<SkillRecord> {
        self.records.get(id).map(|r| r.value().clone())
    }

    fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Current `skills` section of the document.
    pub async fn skills_config(&self) -> Result<SkillsConfig, SkillError> {
        let doc = self.settings.load_document().await?;
        read_skills_config(&doc)
    }

    fn ensure_allowed(config: &SkillsConfig, id: &str) -> Result<(), SkillError> {
        if config.is_allowed(id) {
            Ok(())
        } else {
            Err(SkillError::NotAllowlisted(id.to_string()))
        }
    }

    fn publish(&self, name: &str, id: &str, payload: Value) {
        self.services.bus.publish(BusEvent::lifecycle(name, id, payload));
    }

    // -- public operations ---------------------------------------------------

    /// Enable an allow-listed skill and persist it in `skills.enabled`.
    ///
    /// If persisting fails the skill is torn down again, so the in-memory
    /// enabled set ends up as it was before the call.
    pub async fn enable(&self, id: &str) -> Result<LoadedSkill, SkillError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let config = self.skills_config().await?;
        Self::ensure_allowed(&config, id)?;

        let was_enabled = self.registry().is_enabled(id);
        let projection = self.activate(id, &config).await?;

        if !was_enabled {
            if let Err(e) = self.persist_membership(id, true).await {
                tracing::warn!(skill = %id, error = %e, "persisting enable failed, rolling back");
                self.teardown(id).await;
                return Err(e);
            }
        }
        Ok(projection)
    }

    /// Disable an allow-listed skill and drop it from `skills.enabled`.
    pub async fn disable(&self, id: &str) -> Result<LoadedSkill, SkillError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let config = self.skills_config().await?;
        Self::ensure_allowed(&config, id)?;

        let was_enabled = self.registry().is_enabled(id);
        let persisted = config.enabled.iter().any(|e| e == id);
        let previous = self.registry().projection(id);
        let projection = self.teardown(id).await;

        // A skill that failed to load is still listed in `skills.enabled` and
        // would be retried on every reload until it is dropped here.
        if was_enabled || persisted {
            if let Err(e) = self.persist_membership(id, false).await {
                tracing::warn!(skill = %id, error = %e, "persisting disable failed, rolling back");
                if was_enabled {
                    self.registry().mark_enabled(id);
                    self.run_module_hooks(id, ENABLE_OP).await;
                }
                if let Some(previous) = previous {
                    self.registry().set_projection(previous);
                }
                return Err(e);
            }
        }
        Ok(projection)
    }

    /// Bring the running set in line with `skills.enabled`.
    ///
    /// Skills no longer targeted are disabled; every targeted skill is
    /// enabled. A failure is recorded against its id and does not stop the
    /// others. Nothing is written back.
    ///
    /// Ids whose lock is held are skipped and reported as `busy`. This covers
    /// a skill that reloads from inside its own lifecycle hook, which would
    /// otherwise wait on the lock its caller holds.
    pub async fn reload_enabled(&self) -> Result<ReloadReport, SkillError> {
        let config = self.skills_config().await?;
        let mut report = ReloadReport::default();

        for id in self.registry().enabled_ids() {
            if config.enabled.contains(&id) {
                continue;
            }
            let lock = self.lock_for(&id);
            let Ok(_guard) = lock.try_lock() else {
                tracing::debug!(skill = %id, "skill busy, left for its current operation");
                report.busy.push(id);
                continue;
            };
            self.teardown(&id).await;
            report.disabled.push(id);
        }

        let mut targets = config.enabled.clone();
        targets.sort();
        targets.dedup();
        for id in targets {
            let lock = self.lock_for(&id);
            let Ok(_guard) = lock.try_lock() else {
                tracing::debug!(skill = %id, "skill busy, left for its current operation");
                report.busy.push(id);
                continue;
            };

            let result = match Self::ensure_allowed(&config, &id) {
                Ok(()) => self.activate(&id, &config).await.map(|_| ()),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => report.enabled.push(id),
                Err(e) => {
                    tracing::warn!(skill = %id, error = %e, "skill failed during reload");
                    report.failed.push(ReloadFailure {
                        id,
                        kind: e.kind(),
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            enabled = report.enabled.len(),
            disabled = report.disabled.len(),
            failed = report.failed.len(),
            busy = report.busy.len(),
            "skills reloaded"
        );
        Ok(report)
    }

    /// Every allow-listed or known skill, sorted by id.
    pub async fn list(&self) -> Result<Vec<LoadedSkill>, SkillError> {
        let config = self.skills_config().await?;

        let mut by_id = std::collections::BTreeMap::new();
        for id in &config.allow {
            by_id.insert(id.clone(), LoadedSkill::unloaded(id.clone()));
        }
        for projection in self.registry().projections() {
            by_id.insert(projection.id.clone(), projection);
        }

        Ok(by_id
            .into_values()
            .map(|mut skill| {
                skill.enabled = self.registry().is_enabled(&skill.id);
                if let Some(record) = self.record(&skill.id) {
                    skill.capabilities.get_or_insert(record.capabilities);
                    skill.kind.get_or_insert(record.kind);
                }
                skill
            })
            .collect())
    }

    /// Settings metadata from the live cache, else from the last good load.
    fn settings_meta(&self, id: &str) -> Option<SettingsMeta> {
        self.registry()
            .settings_meta(id)
            .or_else(|| self.record(id).and_then(|r| r.settings_meta))
    }

    pub async fn get_settings(&self, id: &str) -> Result<MaskedSettings, SkillError> {
        Self::ensure_allowed(&self.skills_config().await?, id)?;
        let meta = self.settings_meta(id);
        self.settings.read_masked(id, meta.as_ref()).await
    }

    pub async fn update_settings(&self, id: &str, patch: &Value) -> Result<MaskedSettings, SkillError> {
        Self::ensure_allowed(&self.skills_config().await?, id)?;
        let meta = self.settings_meta(id);
        self.settings.update(id, patch, meta.as_ref()).await
    }

    /// Declared identity, capabilities and settings form of a skill.
    pub async fn describe(&self, id: &str) -> Result<Value, SkillError> {
        Self::ensure_allowed(&self.skills_config().await?, id)?;
        let projection = self
            .registry()
            .projection(id)
            .unwrap_or_else(|| LoadedSkill::unloaded(id));
        let record = self.record(id);
        let meta = self.settings_meta(id);

        let settings = meta.map(|m| {
            let defaults = mask_sensitive(&Value::Object(m.defaults.clone()), &m.sensitive_paths);
            json!({
                "schema": m.schema,
                "sensitive_paths": m.sensitive_paths,
                "defaults": defaults.masked_settings,
            })
        });

        Ok(json!({
            "id": id,
            "name": record.as_ref().and_then(|r| r.name.clone()),
            "description": record.as_ref().and_then(|r| r.description.clone()),
            "version": projection.version,
            "kind": projection.kind,
            "status": projection.status,
            "enabled": self.registry().is_enabled(id),
            "source": projection.source.as_ref().map(ToString::to_string),
            "capabilities": record.as_ref().map(|r| r.capabilities.clone()),
            "modules": self.registry().modules_of(id),
            "settings": settings,
        }))
    }

    // -- lifecycle internals -------------------------------------------------

    /// Make `id` enabled without touching `skills.enabled`. Caller holds the
    /// id's lock and has checked the allow-list.
    async fn activate(&self, id: &str, config: &SkillsConfig) -> Result<LoadedSkill, SkillError> {
        let projection = self.registry().projection(id);

        if self.registry().is_enabled(id) {
            if let Some(p) = projection.as_ref().filter(|p| p.status == SkillStatus::Loaded) {
                tracing::debug!(skill = %id, "skill already enabled");
                return Ok(p.clone());
            }
        }

        let fast_path = self.record(id).filter(|_| {
            projection
                .as_ref()
                .is_some_and(|p| p.status != SkillStatus::Error)
        });

        let result = match fast_path {
            Some(record) => self.reenable(record).await,
            None => self.load_and_enable(id, config).await,
        };

        match result {
            Ok(projection) => {
                self.registry().set_projection(projection.clone());
                tracing::info!(
                    skill = %id,
                    version = projection.version.as_deref().unwrap_or("-"),
                    modules = projection.modules_registered.len(),
                    "skill enabled"
                );
                self.publish(
                    SKILL_ENABLED,
                    id,
                    json!({ "version": projection.version, "modules": projection.modules_registered }),
                );
                Ok(projection)
            }
            Err(e) => {
                self.registry().mark_disabled(id);
                self.registry().end_activation(id);
                self.registry().clear_settings_meta(id);

                let mut failed = projection.unwrap_or_else(|| LoadedSkill::unloaded(id));
                failed.enabled = false;
                failed.status = SkillStatus::Error;
                failed.error = Some(e.to_string());
                failed.updated_at = Utc::now();
                self.registry().set_projection(failed);

                tracing::warn!(skill = %id, error = %e, "skill failed to enable");
                self.publish(SKILL_FAILED, id, json!({ "kind": e.kind(), "error": e.to_string() }));
                Err(e)
            }
        }
    }

    /// Fast path for a disabled skill with a live record.
    async fn reenable(&self, record: SkillRecord) -> Result<LoadedSkill, SkillError> {
        let id = record.id.as_str();
        self.settings
            .bootstrap_defaults(id, record.settings_meta.as_ref())
            .await?;
        if let Some(meta) = &record.settings_meta {
            self.registry().set_settings_meta(id, meta.clone());
        }

        self.registry().begin_activation(id);
        let hooks = self.invoke_module_hooks(id, ENABLE_OP).await;
        if hooks.is_ok() {
            self.registry().mark_enabled(id);
        }
        self.registry().end_activation(id);
        hooks?;

        Ok(record.projection(true, SkillStatus::Loaded, self.registry().modules_of(id)))
    }

    /// Full path: resolve, load, validate, bootstrap, run `on_enable`.
    async fn load_and_enable(&self, id: &str, config: &SkillsConfig) -> Result<LoadedSkill, SkillError> {
        let package = self.resolver.resolve(id, &config.resolve).await?;
        let export = self.loader.load(&package).await?;
        let skill = normalize(export, id, package.manifest.version.as_deref())?;

        let context = SkillContext::new(
            self.services.clone(),
            id,
            skill.version.clone(),
            &skill.capabilities.kernel_ops,
        );

        self.settings
            .bootstrap_defaults(id, skill.settings_meta.as_ref())
            .await?;
        if let Some(meta) = &skill.settings_meta {
            self.registry().set_settings_meta(id, meta.clone());
        }

        self.registry().begin_activation(id);
        let hook_result = (skill.on_enable)(context.clone()).await;
        if hook_result.is_ok() {
            self.registry().mark_enabled(id);
        }
        self.registry().end_activation(id);
        hook_result?;

        let record = SkillRecord {
            id: id.to_string(),
            version: skill.version,
            name: skill.name,
            description: skill.description,
            kind: skill.kind,
            capabilities: skill.capabilities,
            settings_meta: skill.settings_meta,
            source: package.source,
            context,
            on_disable: skill.on_disable,
        };
        let projection = record.projection(true, SkillStatus::Loaded, self.registry().modules_of(id));
        self.records.insert(id.to_string(), record);
        Ok(projection)
    }

    /// Disable `id` in memory and run best-effort cleanup. Caller holds the
    /// id's lock.
    async fn teardown(&self, id: &str) -> LoadedSkill {
        // Removed first so the skill's own sandbox calls start failing now.
        self.registry().mark_disabled(id);

        let record = self.record(id);
        if let Some((hook, context)) = record
            .as_ref()
            .and_then(|r| r.on_disable.clone().map(|h| (h, r.context.clone())))
        {
            if let Err(e) = hook(context).await {
                tracing::warn!(skill = %id, error = %e, "on_disable hook failed");
            }
        }

        self.run_module_hooks(id, DISABLE_OP).await;

        let mut projection = self
            .registry()
            .projection(id)
            .unwrap_or_else(|| LoadedSkill::unloaded(id));
        projection.enabled = false;
        projection.status = SkillStatus::Disabled;
        projection.error = None;
        projection.modules_registered = self.registry().modules_of(id);
        projection.updated_at = Utc::now();
        self.registry().set_projection(projection.clone());

        tracing::info!(skill = %id, "skill disabled");
        self.publish(SKILL_DISABLED, id, Value::Null);
        projection
    }

    /// Context for commands the runtime itself sends to skill modules.
    fn runtime_context(&self) -> ActorContext {
        let ctx = ActorContext::for_actor(Actor::new("runtime", Role::System).with_source("lifecycle"));
        match self.guard().token() {
            Some(token) => ctx.with_token(token.clone()),
            None => ctx,
        }
    }

    /// Send `op` to every module owned by `id`. Modules without that op are
    /// skipped; the first other failure is returned.
    async fn invoke_module_hooks(&self, id: &str, op: &str) -> Result<(), SkillError> {
        for name in self.registry().modules_of(id) {
            let Some(module) = self.services.modules.get(&name) else {
                continue;
            };
            let cmd = Command::new(name.clone(), op, json!({ "skill": id }))
                .with_context(self.runtime_context());
            match module.handle_boxed(cmd).await {
                Ok(_) | Err(SkillError::NoSuchOp { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Like [`Self::invoke_module_hooks`] but never fails: every module is
    /// tried and failures are logged.
    async fn run_module_hooks(&self, id: &str, op: &str) {
        for name in self.registry().modules_of(id) {
            let Some(module) = self.services.modules.get(&name) else {
                continue;
            };
            let cmd = Command::new(name.clone(), op, json!({ "skill": id }))
                .with_context(self.runtime_context());
            match module.handle_boxed(cmd).await {
                Ok(_) | Err(SkillError::NoSuchOp { .. }) => {}
                Err(e) => tracing::warn!(skill = %id, module = %name, op, error = %e, "module hook failed"),
            }
        }
    }

    /// Add or remove `id` in the persisted `skills.enabled` list.
    async fn persist_membership(&self, id: &str, enabled: bool) -> Result<(), SkillError> {
        self.settings
            .modify(|doc| {
                let mut config = read_skills_config(doc)?;
                config.enabled.retain(|e| e != id);
                if enabled {
                    config.enabled.push(id.to_string());
                }
                super::config::write_enabled(doc, &config.enabled);
                Ok(())
            })
            .await?;
        tracing::debug!(skill = %id, enabled, key = SKILLS_KEY, "enabled set persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use skillgate_types::error::StoreError;
    use skillgate_types::skill::PackageManifest;

    use crate::event::EventBus;
    use crate::kernel::{
        DynDispatcher, GatedDispatcher, InMemoryModuleRegistry, KernelModule, ModuleGate,
        ModuleRegistry,
    };
    use crate::skill::commands::SkillsModule;
    use crate::skill::descriptor::{hook, LegacySkill, SkillDescriptor, SkillExport};
    use crate::skill::loader::StaticLoader;
    use crate::storage::MemoryDocumentStore;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    /// Every `/repo/skills/<id>` directory holds a package named `<id>`.
    struct FakeProbe;

    impl PackageProbe for FakeProbe {
        async fn read_manifest(&self, dir: &Path) -> Result<Option<PackageManifest>, StoreError> {
            let Ok(rest) = dir.strip_prefix("/repo/skills") else {
                return Ok(None);
            };
            if rest.components().count() != 1 {
                return Ok(None);
            }
            Ok(Some(PackageManifest {
                name: rest.display().to_string(),
                version: Some("1.0.0".to_string()),
                exports: None,
                module: None,
                main: None,
            }))
        }

        async fn is_file(&self, _path: &Path) -> bool {
            true
        }
    }

    /// Module that records lifecycle ops sent to it.
    struct Tracker {
        name: String,
        ops: Arc<StdMutex<Vec<String>>>,
    }

    impl KernelModule for Tracker {
        fn name(&self) -> &str {
            &self.name
        }

        async fn handle(&self, cmd: Command) -> Result<Value, SkillError> {
            self.ops.lock().unwrap().push(cmd.op.clone());
            match cmd.op.as_str() {
                "ping" => Ok(json!("pong")),
                DISABLE_OP | ENABLE_OP => Ok(Value::Null),
                _ => Err(SkillError::NoSuchOp {
                    module: self.name.clone(),
                    op: cmd.op,
                }),
            }
        }
    }

    type TestManager = SkillManager<MemoryDocumentStore, FakeProbe, StaticLoader>;

    struct Harness {
        manager: TestManager,
        doc: Arc<MemoryDocumentStore>,
        modules: Arc<dyn ModuleRegistry>,
        bus: EventBus,
    }

    fn harness(doc: Value, loader: StaticLoader) -> Harness {
        let registry = Arc::new(SkillRegistry::new());
        let modules: Arc<dyn ModuleRegistry> = Arc::new(InMemoryModuleRegistry::new());
        let guard = Arc::new(CapabilityGuard::new());
        guard.initialize(SECRET).unwrap();
        let dispatcher: DynDispatcher =
            Arc::new(GatedDispatcher::new(modules.clone(), registry.clone()));
        let bus = EventBus::new(64);

        let services = SandboxServices {
            registry,
            modules: modules.clone(),
            dispatcher,
            bus: bus.clone(),
            guard,
        };
        let doc = Arc::new(MemoryDocumentStore::new(doc));
        let settings = Arc::new(SettingsStore::new(doc.clone()));
        let resolver = TrustedResolver::new(FakeProbe, "/repo", None);

        Harness {
            manager: SkillManager::new(services, settings, resolver, loader),
            doc,
            modules,
            bus,
        }
    }

    fn allow(ids: &[&str]) -> Value {
        json!({ "skills": { "allow": ids, "enabled": [] } })
    }

    fn simple(id: &'static str) -> SkillExport {
        SkillExport::Descriptor(SkillDescriptor::new(id, "1.0.0", hook(|_| async { Ok(()) })))
    }

    #[tokio::test]
    async fn enable_requires_allow_list() {
        let h = harness(allow(&["s1"]), StaticLoader::new().with("s2", || simple("s2")));

        let err = h.manager.enable("s2").await.unwrap_err();
        assert!(matches!(err, SkillError::NotAllowlisted(_)));
        assert!(h.manager.registry().enabled_ids().is_empty());
        assert_eq!(h.doc.save_count(), 0);
    }

    #[tokio::test]
    async fn enable_persists_and_preserves_siblings() {
        let mut doc = allow(&["s1"]);
        doc["channels"] = json!({ "telegram": { "token": "t" } });
        let h = harness(doc, StaticLoader::new().with("s1", || simple("s1")));

        let skill = h.manager.enable("s1").await.unwrap();
        assert!(skill.enabled);
        assert_eq!(skill.status, SkillStatus::Loaded);
        assert_eq!(skill.version.as_deref(), Some("1.0.0"));

        let stored = h.doc.snapshot();
        assert_eq!(stored["skills"]["enabled"], json!(["s1"]));
        assert_eq!(stored["skills"]["allow"], json!(["s1"]));
        assert_eq!(stored["channels"]["telegram"]["token"], "t");

        // Second enable is a no-op.
        h.manager.enable("s1").await.unwrap();
        assert_eq!(h.doc.save_count(), 1);
    }

    #[tokio::test]
    async fn failing_enable_hook_is_recorded() {
        let loader = StaticLoader::new().with("s1", || {
            SkillExport::Descriptor(SkillDescriptor::new(
                "s1",
                "1.0.0",
                hook(|_| async { Err(SkillError::hook("boom")) }),
            ))
        });
        let h = harness(allow(&["s1"]), loader);
        let mut rx = h.bus.subscribe();

        let err = h.manager.enable("s1").await.unwrap_err();
        assert_eq!(err.to_string(), "boom");

        let list = h.manager.list().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, "s1");
        assert_eq!(list[0].status, SkillStatus::Error);
        assert_eq!(list[0].error.as_deref(), Some("boom"));
        assert!(!list[0].enabled);
        assert!(h.manager.registry().enabled_ids().is_empty());
        assert!(h.manager.registry().settings_meta("s1").is_none());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name, SKILL_FAILED);
        assert_eq!(event.payload["error"], "boom");
    }

    #[tokio::test]
    async fn defaults_applied_once() {
        let loader = StaticLoader::new().with("s1", || {
            SkillExport::Descriptor(
                SkillDescriptor::new("s1", "1.0.0", hook(|_| async { Ok(()) })).with_settings(
                    SettingsMeta {
                        defaults: json!({ "units": "metric", "api_key": "" })
                            .as_object()
                            .cloned()
                            .unwrap(),
                        sensitive_paths: vec!["api_key".to_string()],
                        schema: None,
                    },
                ),
            )
        });
        let h = harness(allow(&["s1"]), loader);

        h.manager.enable("s1").await.unwrap();
        assert_eq!(
            h.manager.settings().read("s1").await.unwrap(),
            json!({ "units": "metric", "api_key": "" })
        );

        h.manager
            .update_settings("s1", &json!({ "units": "imperial", "api_key": "k-123" }))
            .await
            .unwrap();
        h.manager.disable("s1").await.unwrap();
        h.manager.enable("s1").await.unwrap();

        let masked = h.manager.get_settings("s1").await.unwrap();
        assert_eq!(masked.masked_settings["units"], "imperial");
        assert_eq!(masked.masked_settings["api_key"], crate::settings::MASK_SENTINEL);
        assert_eq!(h.manager.settings().read("s1").await.unwrap()["api_key"], "k-123");
    }

    #[tokio::test]
    async fn persist_failure_rolls_back_enable_and_disable() {
        let h = harness(allow(&["s1"]), StaticLoader::new().with("s1", || simple("s1")));

        h.doc.set_fail_saves(true);
        let err = h.manager.enable("s1").await.unwrap_err();
        assert!(matches!(err, SkillError::PersistFailed(_)));
        assert!(h.manager.registry().enabled_ids().is_empty());

        h.doc.set_fail_saves(false);
        h.manager.enable("s1").await.unwrap();
        assert_eq!(h.manager.registry().enabled_ids(), vec!["s1"]);

        h.doc.set_fail_saves(true);
        let err = h.manager.disable("s1").await.unwrap_err();
        assert!(matches!(err, SkillError::PersistFailed(_)));
        assert_eq!(h.manager.registry().enabled_ids(), vec!["s1"]);
        assert_eq!(
            h.manager.registry().projection("s1").unwrap().status,
            SkillStatus::Loaded
        );
    }

    #[tokio::test]
    async fn second_owner_of_module_fails_enable() {
        let ops = Arc::new(StdMutex::new(Vec::new()));
        let register = |id: &'static str, ops: Arc<StdMutex<Vec<String>>>| {
            move || {
                let ops = ops.clone();
                SkillExport::Descriptor(SkillDescriptor::new(
                    id,
                    "1.0.0",
                    hook(move |ctx: SkillContext| {
                        let ops = ops.clone();
                        async move {
                            ctx.register_module(Arc::new(Tracker {
                                name: "echo".to_string(),
                                ops,
                            }))
                        }
                    }),
                ))
            }
        };
        let loader = StaticLoader::new()
            .with("s1", register("s1", ops.clone()))
            .with("s2", register("s2", ops.clone()));
        let h = harness(allow(&["s1", "s2"]), loader);

        let s1 = h.manager.enable("s1").await.unwrap();
        assert_eq!(s1.modules_registered, vec!["echo"]);

        let err = h.manager.enable("s2").await.unwrap_err();
        assert!(matches!(err, SkillError::ModuleConflict(_)));
        assert_eq!(h.manager.registry().owner_of("echo").as_deref(), Some("s1"));

        let list = h.manager.list().await.unwrap();
        assert_eq!(list[1].id, "s2");
        assert_eq!(list[1].status, SkillStatus::Error);
    }

    #[tokio::test]
    async fn disable_then_enable_takes_fast_path() {
        let loads = Arc::new(AtomicUsize::new(0));
        let ops = Arc::new(StdMutex::new(Vec::new()));
        let disabled_hook_calls = Arc::new(AtomicUsize::new(0));

        let loader = {
            let loads = loads.clone();
            let ops = ops.clone();
            let disabled_hook_calls = disabled_hook_calls.clone();
            StaticLoader::new().with("s1", move || {
                loads.fetch_add(1, Ordering::SeqCst);
                let ops = ops.clone();
                let calls = disabled_hook_calls.clone();
                SkillExport::Descriptor(
                    SkillDescriptor::new(
                        "s1",
                        "2.1.0",
                        hook(move |ctx: SkillContext| {
                            let ops = ops.clone();
                            async move {
                                ctx.register_module(Arc::new(Tracker {
                                    name: "echo".to_string(),
                                    ops,
                                }))
                            }
                        }),
                    )
                    .with_on_disable(hook(move |ctx: SkillContext| {
                        let calls = calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            // The skill is already out of the enabled set.
                            let err = ctx.emit("bye", json!({})).unwrap_err();
                            assert!(matches!(err, SkillError::SkillDisabled(_)));
                            Err(SkillError::hook("cleanup failed"))
                        }
                    })),
                )
            })
        };
        let h = harness(allow(&["s1"]), loader);

        h.manager.enable("s1").await.unwrap();
        let disabled = h.manager.disable("s1").await.unwrap();
        assert_eq!(disabled.status, SkillStatus::Disabled);
        assert_eq!(disabled.modules_registered, vec!["echo"]);
        assert_eq!(disabled_hook_calls.load(Ordering::SeqCst), 1);

        // Commands to the disabled skill's module are refused.
        let err = h
            .manager
            .services
            .dispatcher
            .dispatch_boxed(Command::new("echo", "ping", Value::Null))
            .await
            .unwrap_err();
        assert!(matches!(err, SkillError::ModuleDisabled(_)));

        let enabled = h.manager.enable("s1").await.unwrap();
        assert_eq!(enabled.version.as_deref(), Some("2.1.0"));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(*ops.lock().unwrap(), vec![DISABLE_OP, ENABLE_OP]);
        assert!(h.manager.registry().check_module_access("echo").is_ok());
        assert!(h.modules.contains("echo"));
    }

    #[tokio::test]
    async fn enable_after_error_reloads() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let loader = {
            let attempts = attempts.clone();
            StaticLoader::new().with("s1", move || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                SkillExport::Descriptor(SkillDescriptor::new(
                    "s1",
                    "1.0.0",
                    hook(move |_| async move {
                        if n == 0 {
                            Err(SkillError::hook("first try fails"))
                        } else {
                            Ok(())
                        }
                    }),
                ))
            })
        };
        let h = harness(allow(&["s1"]), loader);

        assert!(h.manager.enable("s1").await.is_err());
        let skill = h.manager.enable("s1").await.unwrap();
        assert_eq!(skill.status, SkillStatus::Loaded);
        assert!(skill.error.is_none());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn legacy_export_is_loaded() {
        let loader = StaticLoader::new().with("old", || {
            SkillExport::Legacy(LegacySkill {
                register: hook(|ctx: SkillContext| async move {
                    ctx.emit("old.ready", json!({ "ok": true }))
                }),
            })
        });
        let h = harness(allow(&["old"]), loader);
        let mut rx = h.bus.subscribe();

        let skill = h.manager.enable("old").await.unwrap();
        assert_eq!(skill.kind, Some(SkillKind::Legacy));
        assert_eq!(skill.version.as_deref(), Some("1.0.0"));
        assert_eq!(skill.capabilities, Some(SkillCapabilities::default()));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name, "old.ready");
        assert_eq!(event.source.as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn reload_isolates_failures() {
        let loader = StaticLoader::new()
            .with("s1", || simple("s1"))
            .with("s2", || simple("s2"))
            .with("bad", || {
                SkillExport::Descriptor(SkillDescriptor::new(
                    "bad",
                    "1.0.0",
                    hook(|_| async { Err(SkillError::hook("nope")) }),
                ))
            });
        let h = harness(
            json!({ "skills": { "allow": ["s1", "s2", "bad"], "enabled": ["bad", "s1", "ghost"] } }),
            loader,
        );

        let report = h.manager.reload_enabled().await.unwrap();
        assert_eq!(report.enabled, vec!["s1"]);
        let failed: Vec<&str> = report.failed.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(failed, vec!["bad", "ghost"]);
        assert_eq!(report.failed[1].kind, skillgate_types::error::ErrorKind::NotAllowlisted);

        // s2 enabled out of band, then dropped by the next reload.
        h.manager.enable("s2").await.unwrap();
        let mut doc = h.doc.snapshot();
        doc["skills"]["enabled"] = json!(["s1"]);
        h.doc.save(&doc).await.unwrap();

        let report = h.manager.reload_enabled().await.unwrap();
        assert_eq!(report.disabled, vec!["s2"]);
        assert_eq!(h.manager.registry().enabled_ids(), vec!["s1"]);
    }

    #[tokio::test]
    async fn disable_drops_persisted_skill_that_never_loaded() {
        let loader = StaticLoader::new().with("bad", || {
            SkillExport::Descriptor(SkillDescriptor::new(
                "bad",
                "1.0.0",
                hook(|_| async { Err(SkillError::hook("nope")) }),
            ))
        });
        let h = harness(json!({ "skills": { "allow": ["bad"], "enabled": ["bad"] } }), loader);

        let report = h.manager.reload_enabled().await.unwrap();
        assert_eq!(report.failed.len(), 1);
        assert!(h.manager.registry().enabled_ids().is_empty());

        let skill = h.manager.disable("bad").await.unwrap();
        assert_eq!(skill.status, SkillStatus::Disabled);
        assert_eq!(h.doc.snapshot()["skills"]["enabled"], json!([]));

        // Nothing left to retry.
        let report = h.manager.reload_enabled().await.unwrap();
        assert!(report.failed.is_empty());
        assert!(report.enabled.is_empty());
    }

    #[tokio::test]
    async fn disable_of_idle_skill_keeps_document_untouched() {
        let h = harness(allow(&["s1"]), StaticLoader::new().with("s1", || simple("s1")));

        h.manager.disable("s1").await.unwrap();
        assert_eq!(h.doc.save_count(), 0);
    }

    #[tokio::test]
    async fn enabled_skill_may_reload_from_its_enable_hook() {
        let inner = Arc::new(StdMutex::new(None));
        let loader = {
            let inner = inner.clone();
            StaticLoader::new().with("reloader", move || {
                let inner = inner.clone();
                SkillExport::Descriptor(
                    SkillDescriptor::new(
                        "reloader",
                        "1.0.0",
                        hook(move |ctx: SkillContext| {
                            let inner = inner.clone();
                            async move {
                                let report = ctx
                                    .execute("skills", "reload_enabled", json!({}), None)
                                    .await?;
                                *inner.lock().unwrap() = Some(report);
                                Ok(())
                            }
                        }),
                    )
                    .with_capabilities(SkillCapabilities {
                        kernel_ops: vec!["skills.reload_enabled".to_string()],
                        ..Default::default()
                    }),
                )
            })
        };
        let Harness { manager, modules, .. } = harness(
            json!({ "skills": { "allow": ["reloader"], "enabled": ["reloader"] } }),
            loader,
        );
        let manager = Arc::new(manager);
        modules.register(Arc::new(SkillsModule::new(manager.clone()))).unwrap();

        let report = tokio::time::timeout(Duration::from_secs(3), manager.reload_enabled())
            .await
            .expect("reload must not wait on the hook's own lock")
            .unwrap();
        assert_eq!(report.enabled, vec!["reloader"]);
        assert!(report.busy.is_empty());

        let inner = inner.lock().unwrap().clone().unwrap();
        assert_eq!(inner["busy"], json!(["reloader"]));
        assert_eq!(inner["failed"], json!([]));

        // The operator path sees it running and does not wait either.
        let skill = tokio::time::timeout(Duration::from_secs(3), manager.enable("reloader"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(skill.status, SkillStatus::Loaded);
    }

    #[tokio::test]
    async fn list_unions_allow_list_and_known_skills() {
        let h = harness(
            allow(&["zeta", "alpha"]),
            StaticLoader::new().with("alpha", || simple("alpha")),
        );
        h.manager.enable("alpha").await.unwrap();

        let list = h.manager.list().await.unwrap();
        let ids: Vec<&str> = list.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "zeta"]);
        assert!(list[0].enabled);
        assert!(list[0].capabilities.is_some());
        assert_eq!(list[1].status, SkillStatus::Disabled);
    }

    #[tokio::test]
    async fn settings_ops_are_allow_list_gated() {
        let h = harness(allow(&["s1"]), StaticLoader::new());
        assert!(matches!(
            h.manager.get_settings("nope").await,
            Err(SkillError::NotAllowlisted(_))
        ));
        assert!(matches!(
            h.manager.update_settings("nope", &json!({})).await,
            Err(SkillError::NotAllowlisted(_))
        ));
        assert!(h.manager.get_settings("s1").await.is_ok());
    }

    #[tokio::test]
    async fn describe_masks_sensitive_defaults() {
        let loader = StaticLoader::new().with("s1", || {
            SkillExport::Descriptor(
                SkillDescriptor::new("s1", "1.0.0", hook(|_| async { Ok(()) })).with_settings(
                    SettingsMeta {
                        defaults: json!({ "token": "default-secret" }).as_object().cloned().unwrap(),
                        sensitive_paths: vec!["token".to_string()],
                        schema: None,
                    },
                ),
            )
        });
        let h = harness(allow(&["s1"]), loader);
        h.manager.enable("s1").await.unwrap();

        let described = h.manager.describe("s1").await.unwrap();
        assert_eq!(described["status"], "loaded");
        assert_eq!(
            described["settings"]["defaults"]["token"],
            crate::settings::MASK_SENTINEL
        );
        assert!(!described.to_string().contains("default-secret"));
    }
}

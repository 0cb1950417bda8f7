//! Application state wiring the skill host together.
//!
//! The core services are generic over the document store, package probe and
//! loader; AppState pins them to the concrete infra implementations and
//! registers the `skills` command surface on the dispatcher.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use skillgate_core::event::EventBus;
use skillgate_core::guard::CapabilityGuard;
use skillgate_core::kernel::{
    DynDispatcher, DynModule, GatedDispatcher, InMemoryModuleRegistry, ModuleRegistry,
};
use skillgate_core::settings::SettingsStore;
use skillgate_core::skill::commands::MODULE_NAME;
use skillgate_core::skill::{
    ReloadReport, SandboxServices, SkillManager, SkillRegistry, SkillsModule, TrustedResolver,
};
use skillgate_infra::config::{resolve_paths, AppPaths};
use skillgate_infra::crypto::{load_capability_secret, SecretOrigin};
use skillgate_infra::document::JsonFileDocumentStore;
use skillgate_infra::filesystem::LocalPackageProbe;
use skillgate_infra::skill::PackageLoader;
use skillgate_types::actor::{Actor, ActorContext, Role};
use skillgate_types::command::Command;
use skillgate_types::config::AppConfig;
use skillgate_types::error::SkillError;

use crate::builtin;

/// Concrete type alias for the manager generics pinned to infra implementations.
pub type ConcreteSkillManager =
    SkillManager<JsonFileDocumentStore, LocalPackageProbe, PackageLoader>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ConcreteSkillManager>,
    pub dispatcher: DynDispatcher,
    pub bus: EventBus,
    pub modules: Arc<dyn ModuleRegistry>,
    pub guard: Arc<CapabilityGuard>,
    pub secret_origin: SecretOrigin,
    /// SHA-256 fingerprint of the capability secret; safe to display.
    pub secret_fingerprint: String,
    pub config: AppConfig,
    pub paths: AppPaths,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Install the capability token and wire services for `config`.
    pub async fn init(data_dir: PathBuf, config: AppConfig) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&data_dir).await?;

        let cwd = std::env::current_dir()?;
        let paths = resolve_paths(&config, &data_dir, &cwd);
        tracing::debug!(
            data_dir = %data_dir.display(),
            repo_root = %paths.repo_root.display(),
            document = %paths.document_path.display(),
            "skillgate paths resolved"
        );

        let guard = Arc::new(CapabilityGuard::new());
        let secret = load_capability_secret(&config.capability_secret_env);
        guard.initialize(secret.value.expose())?;

        let registry = Arc::new(SkillRegistry::new());
        let modules: Arc<dyn ModuleRegistry> = Arc::new(InMemoryModuleRegistry::new());
        let dispatcher: DynDispatcher =
            Arc::new(GatedDispatcher::new(modules.clone(), registry.clone()));
        let bus = EventBus::new(config.event_bus_capacity);

        let services = SandboxServices {
            registry,
            modules: modules.clone(),
            dispatcher: dispatcher.clone(),
            bus: bus.clone(),
            guard: guard.clone(),
        };
        let settings = Arc::new(SettingsStore::new(Arc::new(JsonFileDocumentStore::new(
            &paths.document_path,
        ))));
        let resolver = TrustedResolver::new(
            LocalPackageProbe::new(),
            &paths.repo_root,
            Some(paths.package_store.clone()),
        );
        let loader = PackageLoader::new(builtin::catalog());

        let manager = Arc::new(SkillManager::new(services, settings, resolver, loader));
        let surface: DynModule = Arc::new(SkillsModule::new(manager.clone()));
        modules.register(surface)?;

        Ok(Self {
            manager,
            dispatcher,
            bus,
            modules,
            guard,
            secret_origin: secret.origin,
            secret_fingerprint: secret.fingerprint(),
            config,
            paths,
            data_dir,
        })
    }

    /// Start every skill listed in `skills.enabled`, as the host runtime.
    pub async fn boot(&self) -> Result<ReloadReport, SkillError> {
        let value = self
            .command(MODULE_NAME, "reload_enabled", Value::Null, self.runtime_context())
            .await?;
        serde_json::from_value(value)
            .map_err(|e| SkillError::Storage(format!("unexpected reload result: {e}")))
    }

    /// The local operator: owner role, no capability token.
    pub fn operator_context(&self) -> ActorContext {
        let user = std::env::var("USER").unwrap_or_else(|_| "operator".to_string());
        ActorContext::for_actor(Actor::new(user, Role::Owner).with_source("cli"))
    }

    /// The host runtime itself, holding the capability token.
    pub fn runtime_context(&self) -> ActorContext {
        let ctx = ActorContext::for_actor(Actor::new("runtime", Role::System).with_source("runtime"));
        match self.guard.token() {
            Some(token) => ctx.with_token(token.clone()),
            None => ctx,
        }
    }

    /// Dispatch `module.op` with the given caller context.
    pub async fn command(
        &self,
        module: &str,
        op: &str,
        params: Value,
        ctx: ActorContext,
    ) -> Result<Value, SkillError> {
        let cmd = Command::new(module, op, params).with_context(ctx);
        self.dispatcher.dispatch_boxed(cmd).await
    }

    /// Dispatch a raw command as received from outside the process.
    ///
    /// Context smuggled inside `params` is stripped; the operator context is
    /// attached by the transport.
    pub async fn transport_command(&self, raw: Value) -> Result<Value, SkillError> {
        let cmd = Command::from_transport(raw)?.with_context(self.operator_context());
        self.dispatcher.dispatch_boxed(cmd).await
    }
}

//! Command dispatch: route `{module, op, params}` to the owning module.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use skillgate_types::command::Command;
use skillgate_types::error::SkillError;

use super::registry::ModuleRegistry;

/// Accepts a command and returns its result or a typed error.
pub trait CommandDispatcher: Send + Sync {
    fn dispatch(&self, cmd: Command) -> impl Future<Output = Result<Value, SkillError>> + Send;
}

/// Object-safe version of [`CommandDispatcher`] with boxed futures.
pub trait CommandDispatcherDyn: Send + Sync {
    fn dispatch_boxed<'a>(
        &'a self,
        cmd: Command,
    ) -> Pin<Box<dyn Future<Output = Result<Value, SkillError>> + Send + 'a>>;
}

impl<T: CommandDispatcher> CommandDispatcherDyn for T {
    fn dispatch_boxed<'a>(
        &'a self,
        cmd: Command,
    ) -> Pin<Box<dyn Future<Output = Result<Value, SkillError>> + Send + 'a>> {
        Box::pin(self.dispatch(cmd))
    }
}

pub type DynDispatcher = Arc<dyn CommandDispatcherDyn>;

/// Decides whether commands may currently reach a module.
pub trait ModuleGate: Send + Sync {
    /// `ModuleDisabled` when the module belongs to a skill that is not active.
    fn check_module_access(&self, module: &str) -> Result<(), SkillError>;
}

// ---------------------------------------------------------------------------
// ModuleDispatcher
// ---------------------------------------------------------------------------

/// Plain routing by module name.
pub struct ModuleDispatcher {
    modules: Arc<dyn ModuleRegistry>,
}

impl ModuleDispatcher {
    pub fn new(modules: Arc<dyn ModuleRegistry>) -> Self {
        Self { modules }
    }
}

impl CommandDispatcher for ModuleDispatcher {
    async fn dispatch(&self, cmd: Command) -> Result<Value, SkillError> {
        let module = self
            .modules
            .get(&cmd.module)
            .ok_or_else(|| SkillError::UnknownModule(cmd.module.clone()))?;
        tracing::debug!(module = %cmd.module, op = %cmd.op, "dispatching command");
        module.handle_boxed(cmd).await
    }
}

// ---------------------------------------------------------------------------
// GatedDispatcher
// ---------------------------------------------------------------------------

/// Routes like [`ModuleDispatcher`] but refuses modules whose owning skill
/// is disabled.
pub struct GatedDispatcher {
    inner: ModuleDispatcher,
    gate: Arc<dyn ModuleGate>,
}

impl GatedDispatcher {
    pub fn new(modules: Arc<dyn ModuleRegistry>, gate: Arc<dyn ModuleGate>) -> Self {
        Self {
            inner: ModuleDispatcher::new(modules),
            gate,
        }
    }
}

impl CommandDispatcher for GatedDispatcher {
    async fn dispatch(&self, cmd: Command) -> Result<Value, SkillError> {
        if let Err(e) = self.gate.check_module_access(&cmd.module) {
            tracing::debug!(module = %cmd.module, op = %cmd.op, "command refused: {e}");
            return Err(e);
        }
        self.inner.dispatch(cmd).await
    }
}

//! The per-skill sandbox: the only handle a skill gets onto the runtime.
//!
//! A context is built from the skill's id, version and declared `kernel_ops`.
//! Calls out of the sandbox only work while the skill is enabled or running
//! its enable hook, and they carry the capability token only for the
//! `module.op` pairs the skill declared.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use skillgate_types::actor::{Actor, ActorContext, Role};
use skillgate_types::command::Command;
use skillgate_types::error::SkillError;
use skillgate_types::event::BusEvent;
use tracing::Level;

use super::registry::{ModuleClaim, SkillRegistry};
use crate::event::EventBus;
use crate::guard::CapabilityGuard;
use crate::kernel::module::is_valid_module_name;
use crate::kernel::{DynDispatcher, DynModule, ModuleRegistry};

/// Runtime services every sandbox is wired to.
#[derive(Clone)]
pub struct SandboxServices {
    pub registry: Arc<SkillRegistry>,
    pub modules: Arc<dyn ModuleRegistry>,
    pub dispatcher: DynDispatcher,
    pub bus: EventBus,
    pub guard: Arc<CapabilityGuard>,
}

struct ContextInner {
    id: String,
    version: String,
    kernel_ops: HashSet<String>,
    services: SandboxServices,
}

/// Capability-gated facade handed to a skill's hooks. Cheap to clone.
#[derive(Clone)]
pub struct SkillContext {
    inner: Arc<ContextInner>,
}

impl std::fmt::Debug for SkillContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillContext")
            .field("id", &self.inner.id)
            .field("version", &self.inner.version)
            .field("kernel_ops", &self.inner.kernel_ops)
            .finish()
    }
}

impl SkillContext {
    pub fn new(
        services: SandboxServices,
        id: impl Into<String>,
        version: impl Into<String>,
        kernel_ops: &[String],
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                id: id.into(),
                version: version.into(),
                kernel_ops: kernel_ops.iter().cloned().collect(),
                services,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn version(&self) -> &str {
        &self.inner.version
    }

    fn ensure_active(&self) -> Result<(), SkillError> {
        if self.inner.services.registry.is_active(&self.inner.id) {
            Ok(())
        } else {
            Err(SkillError::SkillDisabled(self.inner.id.clone()))
        }
    }

    /// Context attached to every command this skill issues.
    fn call_context(&self, qualified_op: &str) -> ActorContext {
        let actor = Actor::new(format!("skill:{}", self.inner.id), Role::System).with_source("skill");
        let ctx = ActorContext::for_actor(actor);
        match self.inner.services.guard.token() {
            Some(token) if self.inner.kernel_ops.contains(qualified_op) => ctx.with_token(token.clone()),
            _ => ctx,
        }
    }

    /// Issue a command through the dispatcher on behalf of this skill.
    pub async fn execute(
        &self,
        module: &str,
        op: &str,
        params: Value,
        meta: Option<Value>,
    ) -> Result<Value, SkillError> {
        self.ensure_active()?;
        if let Some(meta) = &meta {
            if !(meta.is_object() || meta.is_null()) {
                return Err(SkillError::BadParams(
                    "meta must be a JSON object".to_string(),
                ));
            }
        }

        let mut cmd = Command::new(module, op, params);
        let qualified = cmd.qualified_op();
        let ctx = self.call_context(&qualified);
        let privileged = ctx.capability_token.is_some();
        cmd = cmd.with_params_context(ctx);
        if let Some(meta) = meta.filter(|m| !m.is_null()) {
            cmd = cmd.with_meta(meta);
        }

        tracing::debug!(skill = %self.inner.id, op = %qualified, privileged, "sandbox execute");
        self.inner.services.dispatcher.dispatch_boxed(cmd).await
    }

    /// Register a kernel module owned by this skill.
    pub fn register_module(&self, module: DynModule) -> Result<(), SkillError> {
        let name = module.name().to_string();
        if !is_valid_module_name(&name) {
            return Err(SkillError::BadModule(format!(
                "skill '{}' tried to register a module with invalid name '{name}'",
                self.inner.id
            )));
        }

        let services = &self.inner.services;
        let present = services.modules.contains(&name);
        let claim = services.registry.claim_module(&self.inner.id, &name, present)?;

        if let Err(e) = services.modules.register(module) {
            if claim == ModuleClaim::Claimed {
                services.registry.release_module(&self.inner.id, &name);
            }
            return Err(e);
        }

        tracing::info!(skill = %self.inner.id, module = %name, "skill registered module");
        Ok(())
    }

    /// Publish an event on the bus, tagged with this skill as source.
    pub fn emit(&self, event: &str, payload: impl Serialize) -> Result<(), SkillError> {
        self.ensure_active()?;
        if event.is_empty() {
            return Err(SkillError::BadParams("event name must not be empty".to_string()));
        }
        let payload = serde_json::to_value(payload)
            .map_err(|e| SkillError::BadParams(format!("event payload is not JSON: {e}")))?;
        self.inner
            .services
            .bus
            .publish(BusEvent::new(event, Some(self.inner.id.clone()), payload));
        Ok(())
    }

    /// Log on behalf of the skill.
    pub fn log(&self, level: Level, msg: &str, meta: Option<&Value>) {
        let id = self.inner.id.as_str();
        match level {
            Level::ERROR => tracing::error!(skill = %id, meta = ?meta, "[skill:{id}] {msg}"),
            Level::WARN => tracing::warn!(skill = %id, meta = ?meta, "[skill:{id}] {msg}"),
            Level::INFO => tracing::info!(skill = %id, meta = ?meta, "[skill:{id}] {msg}"),
            Level::DEBUG => tracing::debug!(skill = %id, meta = ?meta, "[skill:{id}] {msg}"),
            _ => tracing::trace!(skill = %id, meta = ?meta, "[skill:{id}] {msg}"),
        }
    }
}

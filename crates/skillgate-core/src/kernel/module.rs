//! Kernel modules: named command handlers addressed as `module.op`.
//!
//! Follows the blanket-impl pattern used for every async port in this crate:
//! 1. `KernelModule` uses RPITIT for implementors
//! 2. Object-safe `KernelModuleDyn` with boxed futures
//! 3. Blanket-impl `KernelModuleDyn` for all `T: KernelModule`

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use skillgate_types::command::Command;
use skillgate_types::error::SkillError;

/// Op invoked on a skill's modules when the skill is (re-)enabled.
pub const ENABLE_OP: &str = "enable";
/// Op invoked on a skill's modules when the skill is disabled.
pub const DISABLE_OP: &str = "disable";

/// A named handler for commands addressed to it.
///
/// Modules that have nothing to do on `enable`/`disable` should answer those
/// ops with [`SkillError::NoSuchOp`]; the lifecycle treats that as "no hook".
pub trait KernelModule: Send + Sync {
    fn name(&self) -> &str;

    fn handle(&self, cmd: Command) -> impl Future<Output = Result<Value, SkillError>> + Send;
}

/// Object-safe version of [`KernelModule`] with boxed futures.
pub trait KernelModuleDyn: Send + Sync {
    fn name(&self) -> &str;

    fn handle_boxed<'a>(
        &'a self,
        cmd: Command,
    ) -> Pin<Box<dyn Future<Output = Result<Value, SkillError>> + Send + 'a>>;
}

impl<T: KernelModule> KernelModuleDyn for T {
    fn name(&self) -> &str {
        KernelModule::name(self)
    }

    fn handle_boxed<'a>(
        &'a self,
        cmd: Command,
    ) -> Pin<Box<dyn Future<Output = Result<Value, SkillError>> + Send + 'a>> {
        Box::pin(self.handle(cmd))
    }
}

/// Shared, type-erased module handle.
pub type DynModule = Arc<dyn KernelModuleDyn>;

/// Module names are identifiers: an ASCII letter followed by ASCII
/// alphanumerics, `_` or `-`. Dots are reserved for `module.op`.
pub fn is_valid_module_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

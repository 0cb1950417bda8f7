//! Kernel ports: modules, the module registry and command dispatch.

pub mod dispatcher;
pub mod module;
pub mod registry;

pub use dispatcher::{
    CommandDispatcher, CommandDispatcherDyn, DynDispatcher, GatedDispatcher, ModuleDispatcher,
    ModuleGate,
};
pub use module::{DynModule, KernelModule, KernelModuleDyn, DISABLE_OP, ENABLE_OP};
pub use registry::{InMemoryModuleRegistry, ModuleRegistry};

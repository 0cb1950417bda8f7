//! Module registry port and the default in-memory implementation.

use dashmap::DashMap;
use skillgate_types::error::SkillError;

use super::module::{is_valid_module_name, DynModule};

/// Register/lookup kernel modules by name.
pub trait ModuleRegistry: Send + Sync {
    /// Insert a module, replacing any module registered under the same name.
    fn register(&self, module: DynModule) -> Result<(), SkillError>;

    fn get(&self, name: &str) -> Option<DynModule>;

    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registered names, sorted.
    fn names(&self) -> Vec<String>;
}

/// Concurrent map of module name to module.
#[derive(Default)]
pub struct InMemoryModuleRegistry {
    modules: DashMap<String, DynModule>,
}

impl InMemoryModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for InMemoryModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryModuleRegistry")
            .field("modules", &self.names())
            .finish()
    }
}

impl ModuleRegistry for InMemoryModuleRegistry {
    fn register(&self, module: DynModule) -> Result<(), SkillError> {
        let name = module.name().to_string();
        if !is_valid_module_name(&name) {
            return Err(SkillError::BadModule(format!("invalid module name '{name}'")));
        }
        tracing::debug!(module = %name, "module registered");
        self.modules.insert(name, module);
        Ok(())
    }

    fn get(&self, name: &str) -> Option<DynModule> {
        self.modules.get(name).map(|entry| entry.value().clone())
    }

    fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

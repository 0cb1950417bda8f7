//! Shared in-memory skill state: enabled/activating sets, public projections,
//! module ownership and cached settings metadata.
//!
//! Every method takes the lock, does a short synchronous update and releases
//! it. Nothing here is held across an `.await`.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::RwLock;

use skillgate_types::error::SkillError;
use skillgate_types::skill::{LoadedSkill, SettingsMeta};

use crate::kernel::ModuleGate;

#[derive(Debug, Default)]
struct RegistryState {
    enabled: HashSet<String>,
    activating: HashSet<String>,
    projections: HashMap<String, LoadedSkill>,
    modules_by_skill: HashMap<String, BTreeSet<String>>,
    owner_by_module: HashMap<String, String>,
    settings_meta: HashMap<String, SettingsMeta>,
}

/// Outcome of [`SkillRegistry::claim_module`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleClaim {
    /// The name was free and now belongs to the caller.
    Claimed,
    /// The caller already owned the name.
    AlreadyOwned,
}

/// Owned registry of runtime skill state.
#[derive(Debug, Default)]
pub struct SkillRegistry {
    state: RwLock<RegistryState>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, RegistryState> {
        self.state.read().expect("skill registry lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, RegistryState> {
        self.state.write().expect("skill registry lock poisoned")
    }

    // -- enabled / activating ------------------------------------------------

    pub fn is_enabled(&self, id: &str) -> bool {
        self.read().enabled.contains(id)
    }

    /// Enabled or currently running its enable hook.
    pub fn is_active(&self, id: &str) -> bool {
        let state = self.read();
        state.enabled.contains(id) || state.activating.contains(id)
    }

    /// Sorted snapshot of the enabled set.
    pub fn enabled_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read().enabled.iter().cloned().collect();
        ids.sort();
        ids
    }

    pub fn begin_activation(&self, id: &str) {
        self.write().activating.insert(id.to_string());
    }

    pub fn end_activation(&self, id: &str) {
        self.write().activating.remove(id);
    }

    pub fn mark_enabled(&self, id: &str) {
        self.write().enabled.insert(id.to_string());
    }

    /// Returns whether the id was enabled.
    pub fn mark_disabled(&self, id: &str) -> bool {
        self.write().enabled.remove(id)
    }

    // -- projections ---------------------------------------------------------

    pub fn set_projection(&self, skill: LoadedSkill) {
        self.write().projections.insert(skill.id.clone(), skill);
    }

    pub fn projection(&self, id: &str) -> Option<LoadedSkill> {
        self.read().projections.get(id).cloned()
    }

    pub fn projections(&self) -> Vec<LoadedSkill> {
        self.read().projections.values().cloned().collect()
    }

    // -- module ownership ----------------------------------------------------

    /// Atomically check and record ownership of `module` by `skill_id`.
    ///
    /// `present_in_registry` says whether the module registry already holds a
    /// module of that name. An unowned but present module is never annexed.
    pub fn claim_module(
        &self,
        skill_id: &str,
        module: &str,
        present_in_registry: bool,
    ) -> Result<ModuleClaim, SkillError> {
        let mut state = self.write();
        match state.owner_by_module.get(module) {
            Some(owner) if owner == skill_id => return Ok(ModuleClaim::AlreadyOwned),
            Some(owner) => {
                return Err(SkillError::ModuleConflict(format!(
                    "module '{module}' is owned by skill '{owner}'"
                )));
            }
            None if present_in_registry => {
                return Err(SkillError::ModuleConflict(format!(
                    "module '{module}' is already registered and not owned by any skill"
                )));
            }
            None => {}
        }
        state
            .owner_by_module
            .insert(module.to_string(), skill_id.to_string());
        state
            .modules_by_skill
            .entry(skill_id.to_string())
            .or_default()
            .insert(module.to_string());
        Ok(ModuleClaim::Claimed)
    }

    /// Undo a claim whose registration failed.
    pub fn release_module(&self, skill_id: &str, module: &str) {
        let mut state = self.write();
        if state.owner_by_module.get(module).map(String::as_str) == Some(skill_id) {
            state.owner_by_module.remove(module);
        }
        if let Some(set) = state.modules_by_skill.get_mut(skill_id) {
            set.remove(module);
        }
    }

    /// Modules owned by a skill, sorted.
    pub fn modules_of(&self, skill_id: &str) -> Vec<String> {
        self.read()
            .modules_by_skill
            .get(skill_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn owner_of(&self, module: &str) -> Option<String> {
        self.read().owner_by_module.get(module).cloned()
    }

    // -- settings metadata ---------------------------------------------------

    pub fn set_settings_meta(&self, id: &str, meta: SettingsMeta) {
        self.write().settings_meta.insert(id.to_string(), meta);
    }

    pub fn settings_meta(&self, id: &str) -> Option<SettingsMeta> {
        self.read().settings_meta.get(id).cloned()
    }

    pub fn clear_settings_meta(&self, id: &str) {
        self.write().settings_meta.remove(id);
    }
}

impl ModuleGate for SkillRegistry {
    fn check_module_access(&self, module: &str) -> Result<(), SkillError> {
        let state = self.read();
        match state.owner_by_module.get(module) {
            Some(owner) if !state.enabled.contains(owner) && !state.activating.contains(owner) => {
                Err(SkillError::ModuleDisabled(module.to_string()))
            }
            _ => Ok(()),
        }
    }
}

//! Loader port: turn a resolved package into a [`SkillExport`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use skillgate_types::error::SkillError;
use skillgate_types::skill::ResolvedPackage;

use super::descriptor::SkillExport;

pub trait SkillLoader: Send + Sync {
    fn load(
        &self,
        package: &ResolvedPackage,
    ) -> impl Future<Output = Result<SkillExport, SkillError>> + Send;
}

/// Builds a fresh export for a compiled-in skill.
pub type SkillFactory = Arc<dyn Fn() -> SkillExport + Send + Sync>;

/// Catalog of skills compiled into the binary, keyed by package name.
///
/// The package still has to resolve through a trusted location; the catalog
/// only replaces reading its entry file.
#[derive(Clone, Default)]
pub struct StaticLoader {
    factories: HashMap<String, SkillFactory>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> SkillExport + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// A fresh export for `name`, if compiled in.
    pub fn instantiate(&self, name: &str) -> Option<SkillExport> {
        self.factories.get(name).map(|factory| factory())
    }
}

impl std::fmt::Debug for StaticLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticLoader")
            .field("skills", &self.names())
            .finish()
    }
}

impl SkillLoader for StaticLoader {
    async fn load(&self, package: &ResolvedPackage) -> Result<SkillExport, SkillError> {
        self.instantiate(&package.manifest.name).ok_or_else(|| {
            SkillError::BadExport(format!(
                "no compiled-in skill named '{}'",
                package.manifest.name
            ))
        })
    }
}

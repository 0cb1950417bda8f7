//! [`SkillLoader`] for packages on disk.

use std::path::Path;

use skillgate_core::skill::{SkillExport, SkillLoader, StaticLoader};
use skillgate_types::error::SkillError;
use skillgate_types::skill::ResolvedPackage;

use super::declarative::parse_entry;

/// Loads a resolved package.
///
/// A package whose name is in the built-in catalog is instantiated from it;
/// otherwise its entry must be a `.json` declarative entry.
#[derive(Debug, Clone, Default)]
pub struct PackageLoader {
    builtin: StaticLoader,
}

impl PackageLoader {
    pub fn new(builtin: StaticLoader) -> Self {
        Self { builtin }
    }

    pub fn builtin(&self) -> &StaticLoader {
        &self.builtin
    }
}

fn is_json_entry(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

impl SkillLoader for PackageLoader {
    async fn load(&self, package: &ResolvedPackage) -> Result<SkillExport, SkillError> {
        if self.builtin.contains(&package.manifest.name) {
            tracing::debug!(skill = %package.id, package = %package.manifest.name, "loading built-in skill");
            return self.builtin.load(package).await;
        }

        if !is_json_entry(&package.entry) {
            return Err(SkillError::BadExport(format!(
                "unsupported entry '{}': expected a .json skill entry",
                package.entry.display()
            )));
        }

        let source = tokio::fs::read_to_string(&package.entry).await.map_err(|e| {
            SkillError::BadExport(format!("cannot read entry '{}': {e}", package.entry.display()))
        })?;

        tracing::debug!(skill = %package.id, entry = %package.entry.display(), "loading declarative skill");
        parse_entry(&source)
    }
}

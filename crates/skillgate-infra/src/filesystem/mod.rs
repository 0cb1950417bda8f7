//! Filesystem adapters for skillgate.
//!
//! [`LocalPackageProbe`] implements the `PackageProbe` port from
//! `skillgate-core` against real directories. Path containment is decided by
//! the resolver before anything here is called; the probe only reads.

use std::path::{Path, PathBuf};

use skillgate_core::skill::PackageProbe;
use skillgate_types::error::StoreError;
use skillgate_types::skill::{PackageManifest, PACKAGE_DESCRIPTOR};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "SKILLGATE_DATA_DIR";

/// Reads `skill.json` descriptors and checks entry files with `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalPackageProbe;

impl LocalPackageProbe {
    pub fn new() -> Self {
        Self
    }

    /// Descriptor path for a package directory.
    pub fn descriptor_path(dir: &Path) -> PathBuf {
        dir.join(PACKAGE_DESCRIPTOR)
    }
}

impl PackageProbe for LocalPackageProbe {
    async fn read_manifest(&self, dir: &Path) -> Result<Option<PackageManifest>, StoreError> {
        let path = Self::descriptor_path(dir);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::Io(format!("{}: {err}", path.display()))),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|err| StoreError::Parse(format!("{}: {err}", path.display())))
    }

    async fn is_file(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }
}

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `SKILLGATE_DATA_DIR` environment variable
/// 2. `~/.skillgate`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".skillgate");
    }

    // Last resort: current directory
    PathBuf::from(".skillgate")
}

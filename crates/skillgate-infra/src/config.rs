//! Process configuration loader for skillgate.
//!
//! Reads `config.toml` from the data directory (`~/.skillgate/` in production)
//! and deserializes it into [`AppConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::{Path, PathBuf};

use skillgate_types::config::AppConfig;

/// Default file name of the JSON configuration document.
pub const DOCUMENT_FILE: &str = "skills.json";

/// Default package store directory under the data dir.
pub const PACKAGE_STORE_DIR: &str = "packages";

/// Load process configuration from `{data_dir}/config.toml`.
///
/// - Missing file: [`AppConfig::default()`].
/// - Unreadable or unparsable file: logs a warning and returns the default.
pub async fn load_app_config(data_dir: &Path) -> AppConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return AppConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return AppConfig::default();
        }
    };

    match toml::from_str::<AppConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            AppConfig::default()
        }
    }
}

/// Concrete locations derived from [`AppConfig`] and the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub repo_root: PathBuf,
    pub package_store: PathBuf,
    pub document_path: PathBuf,
}

/// Fill in every unset location.
///
/// `repo_root` defaults to `cwd`; the package store and the document live in
/// the data directory. Relative configured paths are taken relative to the
/// data directory, and a relative data directory relative to `cwd`, so every
/// returned path is absolute when `cwd` is.
pub fn resolve_paths(config: &AppConfig, data_dir: &Path, cwd: &Path) -> AppPaths {
    let data_dir = if data_dir.is_absolute() {
        data_dir.to_path_buf()
    } else {
        cwd.join(data_dir)
    };
    let anchor = |p: &PathBuf| {
        if p.is_absolute() {
            p.clone()
        } else {
            data_dir.join(p)
        }
    };

    AppPaths {
        repo_root: config.repo_root.as_ref().map(anchor).unwrap_or_else(|| cwd.to_path_buf()),
        package_store: config
            .package_store
            .as_ref()
            .map(anchor)
            .unwrap_or_else(|| data_dir.join(PACKAGE_STORE_DIR)),
        document_path: config
            .document_path
            .as_ref()
            .map(anchor)
            .unwrap_or_else(|| data_dir.join(DOCUMENT_FILE)),
    }
}

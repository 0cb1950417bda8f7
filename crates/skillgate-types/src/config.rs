//! Configuration types.
//!
//! `SkillsConfig` is the `skills` section of the durable configuration
//! document. `AppConfig` is the process-level `config.toml` that tells the
//! binary where that document and the trusted package roots live.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The `skills` key of the configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillsConfig {
    /// Ids permitted to be resolved and loaded at all.
    #[serde(default)]
    pub allow: Vec<String>,
    /// Ids that should be running.
    #[serde(default)]
    pub enabled: Vec<String>,
    #[serde(default)]
    pub resolve: ResolveConfig,
}

impl SkillsConfig {
    pub fn is_allowed(&self, id: &str) -> bool {
        self.allow.iter().any(|a| a == id)
    }
}

/// Trusted resolution strategies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveConfig {
    /// Try the package store before local roots.
    #[serde(default)]
    pub package_manager: bool,
    /// Local roots, relative to the repository root, tried in order.
    #[serde(default = "default_local_paths")]
    pub local_paths: Vec<String>,
}

fn default_local_paths() -> Vec<String> {
    vec!["skills".to_string()]
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            package_manager: false,
            local_paths: default_local_paths(),
        }
    }
}

/// Top-level process configuration, loaded from `{data_dir}/config.toml`.
///
/// Every field has a default so a missing file yields a working setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Fixed root that every local skill path must stay inside.
    /// Defaults to the current working directory.
    #[serde(default)]
    pub repo_root: Option<PathBuf>,

    /// Directory the package manager installs skills into.
    /// Defaults to `{data_dir}/packages`.
    #[serde(default)]
    pub package_store: Option<PathBuf>,

    /// JSON configuration document. Defaults to `{data_dir}/skills.json`.
    #[serde(default)]
    pub document_path: Option<PathBuf>,

    /// Environment variable holding the capability secret. When unset or too
    /// short a random secret is generated for the process.
    #[serde(default = "default_capability_secret_env")]
    pub capability_secret_env: String,

    /// Capacity of the broadcast event bus.
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[serde(default)]
    pub otel: bool,
}

fn default_capability_secret_env() -> String {
    "SKILLGATE_CAPABILITY_SECRET".to_string()
}

fn default_event_bus_capacity() -> usize {
    256
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            repo_root: None,
            package_store: None,
            document_path: None,
            capability_secret_env: default_capability_secret_env(),
            event_bus_capacity: default_event_bus_capacity(),
            otel: false,
        }
    }
}

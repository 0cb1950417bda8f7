//! Skill system domain types.
//!
//! Declared capabilities, settings metadata, the on-disk package descriptor,
//! and the externally visible projection of a loaded skill.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Core enums
// ---------------------------------------------------------------------------

/// Which export shape a skill package used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillKind {
    /// Descriptor with declared capabilities and lifecycle hooks.
    Standard,
    /// Bare register function, no declared capabilities.
    Legacy,
}

/// Lifecycle status reported by `list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillStatus {
    Loaded,
    Disabled,
    Error,
}

impl fmt::Display for SkillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded => write!(f, "loaded"),
            Self::Disabled => write!(f, "disabled"),
            Self::Error => write!(f, "error"),
        }
    }
}

// ---------------------------------------------------------------------------
// Declared privileges
// ---------------------------------------------------------------------------

/// Privileges a skill declares up front.
///
/// `kernel_ops` entries are `"module.op"` strings; a call to one of them gets
/// the process capability token attached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillCapabilities {
    #[serde(default)]
    pub kernel_ops: Vec<String>,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub network: bool,
}

// ---------------------------------------------------------------------------
// Settings metadata
// ---------------------------------------------------------------------------

/// Settings a skill declares: defaults, which dotted paths are secrets, and an
/// optional form schema for admin tooling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsMeta {
    #[serde(default)]
    pub defaults: Map<String, Value>,
    #[serde(default)]
    pub sensitive_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Vec<SettingsField>>,
}

/// Input type of a settings form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Select,
    StringList,
}

/// One field of a skill's settings form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsField {
    /// Dotted path into the skill's settings bucket.
    pub key: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(default)]
    pub secret: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

// ---------------------------------------------------------------------------
// Package descriptor (skill.json)
// ---------------------------------------------------------------------------

/// File name of the package descriptor inside a skill package directory.
pub const PACKAGE_DESCRIPTOR: &str = "skill.json";

/// Entry used when the descriptor names none.
pub const DEFAULT_ENTRY: &str = "./index.json";

/// `exports` may be a plain string or a map whose `"."` key names the entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PackageExports {
    Path(String),
    Map(std::collections::BTreeMap<String, String>),
}

/// The `skill.json` descriptor found at the root of a skill package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManifest {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub exports: Option<PackageExports>,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub main: Option<String>,
}

impl PackageManifest {
    /// Entry path as written in the descriptor: exports, then module, then main.
    pub fn entry_spec(&self) -> &str {
        let from_exports = match &self.exports {
            Some(PackageExports::Path(p)) => Some(p.as_str()),
            Some(PackageExports::Map(m)) => m.get(".").map(String::as_str),
            None => None,
        };
        from_exports
            .or(self.module.as_deref())
            .or(self.main.as_deref())
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_ENTRY)
    }
}

// ---------------------------------------------------------------------------
// Resolution result
// ---------------------------------------------------------------------------

/// Which trusted strategy produced a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SkillSource {
    PackageManager { path: PathBuf },
    Local { root: String, path: PathBuf },
}

impl fmt::Display for SkillSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PackageManager { path } => write!(f, "package:{}", path.display()),
            Self::Local { path, .. } => write!(f, "local:{}", path.display()),
        }
    }
}

/// A package that passed every trust check, ready for the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPackage {
    pub id: String,
    pub package_dir: PathBuf,
    pub entry: PathBuf,
    pub manifest: PackageManifest,
    pub source: SkillSource,
}

// ---------------------------------------------------------------------------
// Public projection
// ---------------------------------------------------------------------------

/// Externally visible state of one skill, as returned by `list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedSkill {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub enabled: bool,
    pub status: SkillStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SkillSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<SkillCapabilities>,
    #[serde(default)]
    pub modules_registered: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<SkillKind>,
    pub updated_at: DateTime<Utc>,
}

impl LoadedSkill {
    /// Projection for an allow-listed id that has never been loaded.
    pub fn unloaded(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: None,
            enabled: false,
            status: SkillStatus::Disabled,
            error: None,
            source: None,
            capabilities: None,
            modules_registered: Vec::new(),
            kind: None,
            updated_at: Utc::now(),
        }
    }
}

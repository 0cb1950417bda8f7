use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable machine-readable error codes surfaced by every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    BadParams,
    NotAllowlisted,
    BadExport,
    BadModule,
    ModuleConflict,
    ModuleDisabled,
    SkillDisabled,
    ResolveFailed,
    BadConfig,
    PersistFailed,
    Forbidden,
    InitError,
    NoSuchOp,
    UnknownModule,
    HookFailed,
    Storage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::BadParams => "BAD_PARAMS",
            Self::NotAllowlisted => "NOT_ALLOWLISTED",
            Self::BadExport => "BAD_EXPORT",
            Self::BadModule => "BAD_MODULE",
            Self::ModuleConflict => "MODULE_CONFLICT",
            Self::ModuleDisabled => "MODULE_DISABLED",
            Self::SkillDisabled => "SKILL_DISABLED",
            Self::ResolveFailed => "RESOLVE_FAILED",
            Self::BadConfig => "BAD_CONFIG",
            Self::PersistFailed => "PERSIST_FAILED",
            Self::Forbidden => "FORBIDDEN",
            Self::InitError => "INIT_ERROR",
            Self::NoSuchOp => "NO_SUCH_OP",
            Self::UnknownModule => "UNKNOWN_MODULE",
            Self::HookFailed => "HOOK_FAILED",
            Self::Storage => "STORAGE",
        };
        f.write_str(code)
    }
}

/// Errors raised by the guard, settings store, sandbox and skill manager.
///
/// Every variant maps onto an [`ErrorKind`] so callers across a transport can
/// match on a stable code instead of the message text.
#[derive(Debug, Clone, Error)]
pub enum SkillError {
    #[error("bad params: {0}")]
    BadParams(String),

    #[error("skill '{0}' is not in the allow-list")]
    NotAllowlisted(String),

    #[error("bad export: {0}")]
    BadExport(String),

    #[error("bad module: {0}")]
    BadModule(String),

    #[error("module conflict: {0}")]
    ModuleConflict(String),

    #[error("module '{0}' belongs to a disabled skill")]
    ModuleDisabled(String),

    #[error("skill '{0}' is disabled")]
    SkillDisabled(String),

    #[error("could not resolve skill '{id}': {detail}")]
    ResolveFailed { id: String, detail: String },

    #[error("bad config: {0}")]
    BadConfig(String),

    #[error("failed to persist skills config: {0}")]
    PersistFailed(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("capability guard: {0}")]
    InitError(String),

    #[error("no such operation: {module}.{op}")]
    NoSuchOp { module: String, op: String },

    #[error("unknown module: {0}")]
    UnknownModule(String),

    #[error("{0}")]
    HookFailed(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl SkillError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadParams(_) => ErrorKind::BadParams,
            Self::NotAllowlisted(_) => ErrorKind::NotAllowlisted,
            Self::BadExport(_) => ErrorKind::BadExport,
            Self::BadModule(_) => ErrorKind::BadModule,
            Self::ModuleConflict(_) => ErrorKind::ModuleConflict,
            Self::ModuleDisabled(_) => ErrorKind::ModuleDisabled,
            Self::SkillDisabled(_) => ErrorKind::SkillDisabled,
            Self::ResolveFailed { .. } => ErrorKind::ResolveFailed,
            Self::BadConfig(_) => ErrorKind::BadConfig,
            Self::PersistFailed(_) => ErrorKind::PersistFailed,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::InitError(_) => ErrorKind::InitError,
            Self::NoSuchOp { .. } => ErrorKind::NoSuchOp,
            Self::UnknownModule(_) => ErrorKind::UnknownModule,
            Self::HookFailed(_) => ErrorKind::HookFailed,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Convenience constructor for failures raised from inside skill hooks.
    pub fn hook(message: impl Into<String>) -> Self {
        Self::HookFailed(message.into())
    }

    /// JSON body used by transports to report the error.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
            }
        })
    }
}

/// Errors from the durable storage ports (configuration document, package probe).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl From<StoreError> for SkillError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Io(msg) => SkillError::Storage(msg),
            StoreError::Parse(msg) => SkillError::BadConfig(msg),
        }
    }
}

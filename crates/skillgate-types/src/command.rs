//! The `{module, op, params}` command envelope routed by the dispatcher.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::actor::ActorContext;
use crate::error::SkillError;

/// Param keys a transport might use to smuggle a context in. Always stripped.
const CONTEXT_PARAM_KEYS: &[&str] = &["_ctx", "ctx", "__ctx"];

/// A command addressed to `module.op`.
///
/// The two context carriers are `#[serde(skip)]` so that nothing arriving over a
/// transport can carry a capability token or actor identity. Runtime code
/// attaches them explicitly with [`Command::with_context`] (root carrier) and
/// [`Command::with_params_context`] (params carrier).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub module: String,
    pub op: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(skip)]
    pub context: Option<ActorContext>,
    #[serde(skip)]
    pub params_context: Option<ActorContext>,
}

impl Command {
    pub fn new(module: impl Into<String>, op: impl Into<String>, params: Value) -> Self {
        Self {
            module: module.into(),
            op: op.into(),
            params,
            meta: None,
            context: None,
            params_context: None,
        }
    }

    /// Parse a command that originated outside the process.
    ///
    /// Any context-looking keys inside `params` are dropped.
    pub fn from_transport(raw: Value) -> Result<Self, SkillError> {
        let mut cmd: Command = serde_json::from_value(raw)
            .map_err(|e| SkillError::BadParams(format!("malformed command: {e}")))?;
        if cmd.module.is_empty() || cmd.op.is_empty() {
            return Err(SkillError::BadParams(
                "command requires non-empty module and op".to_string(),
            ));
        }
        if let Value::Object(map) = &mut cmd.params {
            for key in CONTEXT_PARAM_KEYS {
                map.remove(*key);
            }
        }
        Ok(cmd)
    }

    pub fn with_context(mut self, ctx: ActorContext) -> Self {
        self.context = Some(ctx);
        self
    }

    pub fn with_params_context(mut self, ctx: ActorContext) -> Self {
        self.params_context = Some(ctx);
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    /// `"module.op"` key used by kernel-op allow-lists.
    pub fn qualified_op(&self) -> String {
        format!("{}.{}", self.module, self.op)
    }

    /// Read a required string parameter.
    pub fn str_param(&self, name: &str) -> Result<&str, SkillError> {
        self.params
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SkillError::BadParams(format!("missing string param '{name}'")))
    }
}

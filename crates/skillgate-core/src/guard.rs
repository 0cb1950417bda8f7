//! Capability token and role enforcement.
//!
//! The runtime proves it is itself (not an external caller) by presenting the
//! process capability token. Everything else is judged by the actor's role.

use std::sync::OnceLock;

use skillgate_types::actor::{ActorContext, Role};
use skillgate_types::command::Command;
use skillgate_types::error::SkillError;
use skillgate_types::secret::Redacted;

/// Minimum accepted length of the capability secret, in characters.
pub const MIN_SECRET_LEN: usize = 32;

// ---------------------------------------------------------------------------
// CapabilityGuard
// ---------------------------------------------------------------------------

/// Holds the process capability token and checks callers against it.
///
/// The token is installed once by [`CapabilityGuard::initialize`] and is
/// immutable for the lifetime of the guard. One guard is shared (behind an
/// `Arc`) by the manager, every sandbox context, and the command surface.
#[derive(Debug, Default)]
pub struct CapabilityGuard {
    token: OnceLock<Redacted>,
}

impl CapabilityGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the capability token.
    ///
    /// Fails with `InitError` when the secret is shorter than
    /// [`MIN_SECRET_LEN`] or a token is already installed.
    pub fn initialize(&self, secret: impl Into<String>) -> Result<(), SkillError> {
        let secret = secret.into();
        if secret.chars().count() < MIN_SECRET_LEN {
            return Err(SkillError::InitError(format!(
                "capability secret must be at least {MIN_SECRET_LEN} characters"
            )));
        }
        self.token
            .set(Redacted::new(secret))
            .map_err(|_| SkillError::InitError("capability token already initialized".to_string()))
    }

    pub fn is_initialized(&self) -> bool {
        self.token.get().is_some()
    }

    /// The installed token, for attaching to runtime-issued commands.
    pub fn token(&self) -> Option<&Redacted> {
        self.token.get()
    }

    /// Require the caller to present the exact capability token.
    pub fn require_capability(&self, ctx: &ActorContext) -> Result<(), SkillError> {
        let expected = self
            .token
            .get()
            .ok_or_else(|| SkillError::InitError("capability guard not initialized".to_string()))?;

        let presented = ctx
            .capability_token
            .as_ref()
            .ok_or_else(|| SkillError::Forbidden("capability token required".to_string()))?;

        if constant_time_eq(expected.expose().as_bytes(), presented.expose().as_bytes()) {
            Ok(())
        } else {
            Err(SkillError::Forbidden("invalid capability token".to_string()))
        }
    }

    /// Require an actor whose role ranks at least `min_role`.
    pub fn require_role(&self, ctx: &ActorContext, min_role: Role) -> Result<(), SkillError> {
        let actor = ctx
            .actor
            .as_ref()
            .ok_or_else(|| SkillError::Forbidden("no actor in context".to_string()))?;

        if actor.role.at_least(min_role) {
            Ok(())
        } else {
            Err(SkillError::Forbidden(format!(
                "role '{}' is below required role '{}'",
                actor.role, min_role
            )))
        }
    }

    /// Accept either the capability token or a sufficiently ranked actor.
    ///
    /// When both fail, the role check's error is the one surfaced.
    pub fn require_capability_or_role(
        &self,
        ctx: &ActorContext,
        min_role: Role,
    ) -> Result<(), SkillError> {
        match self.require_capability(ctx) {
            Ok(()) => Ok(()),
            Err(_) => self.require_role(ctx, min_role),
        }
    }
}

// ---------------------------------------------------------------------------
// Context extraction
// ---------------------------------------------------------------------------

/// Merge the two runtime-injected context carriers of a command.
///
/// Root fields populate first, then params-level fields override them; a
/// params-level actor therefore wins over a root actor. Both carriers are
/// unreachable from transport input, see [`Command::from_transport`].
pub fn extract_context(cmd: &Command) -> ActorContext {
    let root = cmd.context.clone().unwrap_or_default();
    match &cmd.params_context {
        Some(params) => root.overlay(params),
        None => root,
    }
}

/// Constant-time byte comparison (XOR-based).
///
/// Returns true if and only if `a == b`. Time taken does not depend on how
/// many leading bytes match.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use skillgate_types::actor::Actor;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn guard() -> CapabilityGuard {
        let guard = CapabilityGuard::new();
        guard.initialize(SECRET).unwrap();
        guard
    }

    fn ctx_with_token(token: &str) -> ActorContext {
        ActorContext::default().with_token(Redacted::new(token))
    }

    fn ctx_with_role(role: Role) -> ActorContext {
        ActorContext::for_actor(Actor::new("u1", role))
    }

    #[test]
    fn initialize_rejects_short_secret() {
        let guard = CapabilityGuard::new();
        let err = guard.initialize("too-short").unwrap_err();
        assert!(matches!(err, SkillError::InitError(_)));
        assert!(!guard.is_initialized());
    }

    #[test]
    fn initialize_twice_fails() {
        let guard = guard();
        let err = guard.initialize(SECRET).unwrap_err();
        assert!(matches!(err, SkillError::InitError(_)));
    }

    #[test]
    fn require_capability_before_init_is_init_error() {
        let guard = CapabilityGuard::new();
        let err = guard.require_capability(&ctx_with_token(SECRET)).unwrap_err();
        assert!(matches!(err, SkillError::InitError(_)));
    }

    #[test]
    fn require_capability_accepts_matching_token() {
        assert!(guard().require_capability(&ctx_with_token(SECRET)).is_ok());
    }

    #[test]
    fn require_capability_rejects_missing_or_wrong_token() {
        let guard = guard();
        let missing = guard.require_capability(&ActorContext::default()).unwrap_err();
        assert!(matches!(missing, SkillError::Forbidden(_)));

        let wrong = guard
            .require_capability(&ctx_with_token("0123456789abcdef0123456789abcdeX"))
            .unwrap_err();
        assert!(matches!(wrong, SkillError::Forbidden(_)));
    }

    #[test]
    fn require_role_respects_rank() {
        let guard = guard();
        assert!(guard.require_role(&ctx_with_role(Role::Owner), Role::Admin).is_ok());
        assert!(guard.require_role(&ctx_with_role(Role::Admin), Role::Admin).is_ok());

        let err = guard
            .require_role(&ctx_with_role(Role::Customer), Role::Admin)
            .unwrap_err();
        assert!(err.to_string().contains("customer"));

        let no_actor = guard.require_role(&ActorContext::default(), Role::Customer);
        assert!(matches!(no_actor, Err(SkillError::Forbidden(_))));
    }

    #[test]
    fn capability_or_role_falls_back_to_role() {
        let guard = guard();
        assert!(guard
            .require_capability_or_role(&ctx_with_token(SECRET), Role::Owner)
            .is_ok());
        assert!(guard
            .require_capability_or_role(&ctx_with_role(Role::Admin), Role::Admin)
            .is_ok());

        let err = guard
            .require_capability_or_role(&ctx_with_role(Role::Customer), Role::Admin)
            .unwrap_err();
        assert!(err.to_string().contains("below required role"));
    }

    #[test]
    fn extract_context_params_override_root() {
        let cmd = Command::new("skills", "enable", Value::Null)
            .with_context(ActorContext {
                session_id: Some("sess-1".to_string()),
                capability_token: Some(Redacted::new(SECRET)),
                actor: Some(Actor::new("root-user", Role::Customer)),
            })
            .with_params_context(ActorContext::for_actor(Actor::new("param-user", Role::Admin)));

        let ctx = extract_context(&cmd);
        assert_eq!(ctx.session_id.as_deref(), Some("sess-1"));
        assert_eq!(ctx.capability_token.unwrap().expose(), SECRET);
        assert_eq!(ctx.actor.unwrap().user_id, "param-user");
    }

    #[test]
    fn extract_context_from_transport_is_empty() {
        let cmd = Command::from_transport(serde_json::json!({
            "module": "skills",
            "op": "enable",
            "params": { "id": "s1", "_ctx": { "capability_token": SECRET } },
        }))
        .unwrap();
        assert_eq!(extract_context(&cmd), ActorContext::default());
    }

    #[test]
    fn constant_time_eq_works() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"hello", b"hell"));
        assert!(constant_time_eq(b"", b""));
    }
}

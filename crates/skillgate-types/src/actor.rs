//! Caller identity types: roles, actors and the context carried by commands.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::secret::Redacted;

/// Actor role. Declaration order is rank order: customer < admin < owner < system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Admin,
    Owner,
    System,
}

impl Role {
    pub fn rank(self) -> u8 {
        match self {
            Self::Customer => 0,
            Self::Admin => 1,
            Self::Owner => 2,
            Self::System => 3,
        }
    }

    /// True when this role ranks at or above `min`.
    pub fn at_least(self, min: Role) -> bool {
        self.rank() >= min.rank()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Admin => write!(f, "admin"),
            Self::Owner => write!(f, "owner"),
            Self::System => write!(f, "system"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            "owner" => Ok(Self::Owner),
            "system" => Ok(Self::System),
            other => Err(format!("unknown role: '{other}'")),
        }
    }
}

/// Identity of whoever issued a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            channel: None,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Context attached to a command by the runtime.
///
/// Never deserialized from transport input: commands only gain a context
/// through runtime code paths (see `Command::with_context`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActorContext {
    pub session_id: Option<String>,
    pub capability_token: Option<Redacted>,
    pub actor: Option<Actor>,
}

impl ActorContext {
    pub fn for_actor(actor: Actor) -> Self {
        Self {
            actor: Some(actor),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: Redacted) -> Self {
        self.capability_token = Some(token);
        self
    }

    /// Overlay `other` on top of `self`: every field present in `other` wins.
    pub fn overlay(mut self, other: &ActorContext) -> Self {
        if other.session_id.is_some() {
            self.session_id = other.session_id.clone();
        }
        if other.capability_token.is_some() {
            self.capability_token = other.capability_token.clone();
        }
        if other.actor.is_some() {
            self.actor = other.actor.clone();
        }
        self
    }
}

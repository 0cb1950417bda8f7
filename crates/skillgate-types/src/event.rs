//! Event types for the skillgate event bus.
//!
//! `BusEvent` is the unit broadcast on the bus. Skills publish arbitrary named
//! events through their sandbox; the manager publishes lifecycle events under
//! the `skill.*` names below. Clone + Send + Sync for tokio broadcast channels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Published after a skill finishes enabling.
pub const SKILL_ENABLED: &str = "skill.enabled";
/// Published after a skill finishes disabling.
pub const SKILL_DISABLED: &str = "skill.disabled";
/// Published when an enable attempt fails and the skill is marked `error`.
pub const SKILL_FAILED: &str = "skill.failed";

/// A named event with a JSON payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEvent {
    pub id: Uuid,
    pub name: String,
    /// Id of the skill that emitted the event; `None` for runtime events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub payload: Value,
    pub emitted_at: DateTime<Utc>,
}

impl BusEvent {
    pub fn new(name: impl Into<String>, source: Option<String>, payload: Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            source,
            payload,
            emitted_at: Utc::now(),
        }
    }

    /// Lifecycle event published by the runtime about `skill_id`.
    pub fn lifecycle(name: &str, skill_id: &str, payload: Value) -> Self {
        let mut payload = payload;
        if let Value::Object(map) = &mut payload {
            map.insert("id".to_string(), Value::String(skill_id.to_string()));
        } else {
            payload = serde_json::json!({ "id": skill_id });
        }
        Self::new(name, None, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lifecycle_event_carries_skill_id() {
        let event = BusEvent::lifecycle(SKILL_FAILED, "s1", json!({ "error": "boom" }));
        assert_eq!(event.name, "skill.failed");
        assert!(event.source.is_none());
        assert_eq!(event.payload["id"], "s1");
        assert_eq!(event.payload["error"], "boom");
    }

    #[test]
    fn test_lifecycle_event_with_null_payload() {
        let event = BusEvent::lifecycle(SKILL_ENABLED, "s1", Value::Null);
        assert_eq!(event.payload, json!({ "id": "s1" }));
    }

    #[test]
    fn test_serialized_shape() {
        let event = BusEvent::new("weather.updated", Some("weather".into()), json!({ "t": 21 }));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["name"], "weather.updated");
        assert_eq!(json["source"], "weather");
        assert!(json.get("emitted_at").is_some());
    }
}

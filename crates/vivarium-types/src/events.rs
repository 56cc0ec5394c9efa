//! Immutable event records and payload validation.
//!
//! Events are the source of truth for the simulation's history: an ordered,
//! append-only sequence in which insertion order is causal order. An event is
//! never mutated after construction; derived views ([`EnvironmentSnapshot`])
//! copy events rather than borrow them mutably.
//!
//! Two kinds of events exist, distinguished by [`Event::source_agent_id`]:
//! environment-originated events (`None`, written by the coordinator) and
//! agent feedback (`Some`, produced by an agent after executing a command).
//!
//! [`EnvironmentSnapshot`]: crate::snapshot::EnvironmentSnapshot

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AgentId, EventId};

/// Maximum byte length of a payload key.
pub const PAYLOAD_MAX_KEY_LEN: usize = 64;

/// Maximum nesting depth of payload values.
pub const PAYLOAD_MAX_DEPTH: usize = 8;

/// A semantic key-value payload carried by an event.
///
/// A `BTreeMap` keeps key order deterministic, which in turn makes snapshot
/// serialization byte-stable for identical stored sequences.
pub type Payload = BTreeMap<String, serde_json::Value>;

/// Errors raised when a payload fails validation.
///
/// A malformed payload means the event is discarded and the error is
/// surfaced to the coordinator; it never halts the simulation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    /// A payload key was the empty string.
    #[error("payload key must not be empty")]
    EmptyKey,

    /// A payload key exceeded [`PAYLOAD_MAX_KEY_LEN`] bytes.
    #[error("payload key '{key}' exceeds {limit} bytes")]
    KeyTooLong {
        /// The offending key (truncated for display by the caller if needed).
        key: String,
        /// The enforced limit in bytes.
        limit: usize,
    },

    /// A payload value was JSON `null`.
    #[error("payload key '{key}' holds a null value")]
    NullValue {
        /// The key whose value was null.
        key: String,
    },

    /// A payload value nested deeper than [`PAYLOAD_MAX_DEPTH`] levels.
    #[error("payload key '{key}' nests deeper than {limit} levels")]
    TooDeep {
        /// The key whose value was too deeply nested.
        key: String,
        /// The enforced depth limit.
        limit: usize,
    },
}

/// An immutable record of something that happened in the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique, time-ordered event identifier.
    pub id: EventId,

    /// The tick during which the event was produced.
    pub tick: u64,

    /// Wall-clock time at which the event was constructed.
    pub timestamp: DateTime<Utc>,

    /// The agent that produced this event, or `None` for
    /// environment-originated events.
    pub source_agent_id: Option<AgentId>,

    /// The semantic content of the event.
    pub payload: Payload,
}

impl Event {
    /// Construct an environment-originated event (no source agent).
    pub fn environment(tick: u64, payload: Payload) -> Self {
        Self {
            id: EventId::new(),
            tick,
            timestamp: Utc::now(),
            source_agent_id: None,
            payload,
        }
    }

    /// Construct a feedback event produced by `agent_id`.
    pub fn feedback(tick: u64, agent_id: AgentId, payload: Payload) -> Self {
        Self {
            id: EventId::new(),
            tick,
            timestamp: Utc::now(),
            source_agent_id: Some(agent_id),
            payload,
        }
    }

    /// Whether this event is agent feedback (as opposed to an
    /// environment-originated event).
    pub const fn is_feedback(&self) -> bool {
        self.source_agent_id.is_some()
    }

    /// Validate this event's payload against the payload rules.
    ///
    /// # Errors
    ///
    /// Returns the first [`PayloadError`] encountered, if any.
    pub fn validate(&self) -> Result<(), PayloadError> {
        validate_payload(&self.payload)
    }
}

/// Validate a payload against the structural rules.
///
/// Keys must be non-empty and at most [`PAYLOAD_MAX_KEY_LEN`] bytes. Values
/// may be scalars, arrays, or nested objects up to [`PAYLOAD_MAX_DEPTH`]
/// levels; `null` is rejected everywhere. These rules defend the store (and
/// everything downstream of a snapshot) against junk produced by external
/// collaborators.
///
/// # Errors
///
/// Returns the first [`PayloadError`] encountered.
pub fn validate_payload(payload: &Payload) -> Result<(), PayloadError> {
    for (key, value) in payload {
        if key.is_empty() {
            return Err(PayloadError::EmptyKey);
        }
        if key.len() > PAYLOAD_MAX_KEY_LEN {
            return Err(PayloadError::KeyTooLong {
                key: key.clone(),
                limit: PAYLOAD_MAX_KEY_LEN,
            });
        }
        validate_value(key, value, 1)?;
    }
    Ok(())
}

/// Recursively validate a single payload value.
fn validate_value(
    key: &str,
    value: &serde_json::Value,
    depth: usize,
) -> Result<(), PayloadError> {
    if depth > PAYLOAD_MAX_DEPTH {
        return Err(PayloadError::TooDeep {
            key: key.to_owned(),
            limit: PAYLOAD_MAX_DEPTH,
        });
    }
    match value {
        serde_json::Value::Null => Err(PayloadError::NullValue {
            key: key.to_owned(),
        }),
        serde_json::Value::Array(items) => {
            let next = depth.saturating_add(1);
            for item in items {
                validate_value(key, item, next)?;
            }
            Ok(())
        }
        serde_json::Value::Object(fields) => {
            let next = depth.saturating_add(1);
            for (inner_key, inner) in fields {
                if inner_key.is_empty() {
                    return Err(PayloadError::EmptyKey);
                }
                validate_value(key, inner, next)?;
            }
            Ok(())
        }
        serde_json::Value::Bool(_)
        | serde_json::Value::Number(_)
        | serde_json::Value::String(_) => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn payload_of(pairs: &[(&str, serde_json::Value)]) -> Payload {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[test]
    fn environment_event_has_no_source() {
        let event = Event::environment(3, payload_of(&[("kind", json!("tick_marker"))]));
        assert_eq!(event.tick, 3);
        assert!(event.source_agent_id.is_none());
        assert!(!event.is_feedback());
    }

    #[test]
    fn feedback_event_carries_source() {
        let event = Event::feedback(1, AgentId::new("alice"), Payload::new());
        assert!(event.is_feedback());
        assert_eq!(
            event.source_agent_id.as_ref().map(AgentId::as_str),
            Some("alice")
        );
    }

    #[test]
    fn valid_payload_passes() {
        let payload = payload_of(&[
            ("zone", json!("cafe")),
            ("health", json!(87)),
            ("needs", json!({"hunger": 40, "energy": 55})),
            ("tags", json!(["a", "b"])),
        ]);
        assert!(validate_payload(&payload).is_ok());
    }

    #[test]
    fn empty_key_rejected() {
        let payload = payload_of(&[("", json!(1))]);
        assert_eq!(validate_payload(&payload), Err(PayloadError::EmptyKey));
    }

    #[test]
    fn long_key_rejected() {
        let key = "k".repeat(PAYLOAD_MAX_KEY_LEN.saturating_add(1));
        let payload = payload_of(&[(key.as_str(), json!(1))]);
        assert!(matches!(
            validate_payload(&payload),
            Err(PayloadError::KeyTooLong { .. })
        ));
    }

    #[test]
    fn null_value_rejected() {
        let payload = payload_of(&[("gone", serde_json::Value::Null)]);
        assert!(matches!(
            validate_payload(&payload),
            Err(PayloadError::NullValue { .. })
        ));
    }

    #[test]
    fn nested_null_rejected() {
        let payload = payload_of(&[("outer", json!({"inner": {"leaf": null}}))]);
        assert!(matches!(
            validate_payload(&payload),
            Err(PayloadError::NullValue { .. })
        ));
    }

    #[test]
    fn excessive_depth_rejected() {
        let mut value = json!(1);
        for _ in 0..PAYLOAD_MAX_DEPTH {
            value = json!({ "n": value });
        }
        let payload = payload_of(&[("deep", value)]);
        assert!(matches!(
            validate_payload(&payload),
            Err(PayloadError::TooDeep { .. })
        ));
    }

    #[test]
    fn event_serde_roundtrip() {
        let event = Event::feedback(
            7,
            AgentId::new("bob"),
            payload_of(&[("status", json!("ok"))]),
        );
        let json = serde_json::to_string(&event).unwrap();
        let restored: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event, restored);
    }
}

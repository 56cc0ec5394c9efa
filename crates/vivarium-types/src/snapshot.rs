//! The read-only view of recent environment state.
//!
//! An [`EnvironmentSnapshot`] is assembled by the event store from the most
//! recent events and handed to the decision engine once per tick. It copies
//! events out of the store: building or serializing a snapshot never mutates
//! the underlying sequence.

use serde::{Deserialize, Serialize};

use crate::events::Event;
use crate::ids::AgentId;

/// A derived, read-only view over the tail of the event sequence.
///
/// Given the same stored sequence and the same window, a snapshot (and its
/// [`canonical_json`](Self::canonical_json) rendering) is byte-identical
/// across calls -- the property the decision engine relies on for
/// reproducible inference inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    /// The tick this snapshot was built for.
    pub tick: u64,

    /// The window size used to build it (0 = all events).
    pub window: usize,

    /// The visible events, oldest first, in append order.
    pub events: Vec<Event>,
}

impl EnvironmentSnapshot {
    /// Number of events visible in this snapshot.
    pub const fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the snapshot contains no events.
    pub const fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The most recent feedback event from `agent_id`, if any is visible.
    pub fn latest_feedback_from(&self, agent_id: &AgentId) -> Option<&Event> {
        self.events
            .iter()
            .rev()
            .find(|event| event.source_agent_id.as_ref() == Some(agent_id))
    }

    /// Render the canonical serialized form of this snapshot.
    ///
    /// All maps involved are ordered (`BTreeMap`-backed payloads), so the
    /// output is deterministic: identical stored events and window produce
    /// identical bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if serialization fails (it cannot for
    /// well-formed payloads; the signature exists so callers propagate
    /// rather than panic).
    pub fn canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::events::Payload;

    fn feedback(tick: u64, agent: &str, status: &str) -> Event {
        let mut payload = Payload::new();
        payload.insert("status".to_owned(), json!(status));
        Event::feedback(tick, AgentId::new(agent), payload)
    }

    #[test]
    fn latest_feedback_prefers_newest() {
        let alice = AgentId::new("alice");
        let snapshot = EnvironmentSnapshot {
            tick: 3,
            window: 0,
            events: vec![
                feedback(1, "alice", "ok"),
                feedback(2, "bob", "ok"),
                feedback(2, "alice", "low"),
            ],
        };
        let latest = snapshot.latest_feedback_from(&alice).unwrap();
        assert_eq!(latest.tick, 2);
        assert_eq!(latest.payload.get("status"), Some(&json!("low")));
    }

    #[test]
    fn canonical_json_is_stable() {
        let snapshot = EnvironmentSnapshot {
            tick: 5,
            window: 10,
            events: vec![feedback(4, "alice", "ok"), feedback(4, "bob", "dying")],
        };
        let first = snapshot.canonical_json().unwrap();
        let second = snapshot.canonical_json().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_snapshot_reports_empty() {
        let snapshot = EnvironmentSnapshot {
            tick: 1,
            window: 4,
            events: Vec::new(),
        };
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.len(), 0);
        assert!(snapshot.latest_feedback_from(&AgentId::new("alice")).is_none());
    }
}

//! Identifier types for entities in the simulation.
//!
//! Events get strongly-typed UUID v7 wrappers (time-ordered, so insertion
//! order and id order agree). Agents are different: the roster is a fixed,
//! human-authored set loaded from configuration, so [`AgentId`] wraps a
//! compact string slug (`alice`, `bob`, ...) rather than a generated UUID.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for an event in the event store.
    EventId
}

/// Identifier of an agent in the fixed roster.
///
/// Agent ids are configured at simulation start and never change for the
/// lifetime of a run. They are ordinary strings so that configuration files,
/// decision-engine output, and log lines all use the same readable token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Create an agent id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Return the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for AgentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for AgentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn event_ids_are_time_ordered() {
        let first = EventId::new();
        let second = EventId::new();
        // UUID v7 embeds a millisecond timestamp; ids minted in sequence
        // never sort backwards.
        assert!(first <= second);
    }

    #[test]
    fn event_id_roundtrip_serde() {
        let original = EventId::new();
        let json = serde_json::to_string(&original).unwrap();
        let restored: EventId = serde_json::from_str(&json).unwrap();
        assert_eq!(original, restored);
    }

    #[test]
    fn agent_id_is_transparent_in_json() {
        let id = AgentId::new("alice");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"alice\"");
        let restored: AgentId = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.as_str(), "alice");
    }

    #[test]
    fn agent_id_display_matches_slug() {
        let id = AgentId::from("bob");
        assert_eq!(id.to_string(), "bob");
    }
}

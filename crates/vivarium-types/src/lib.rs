//! Shared type definitions for the Vivarium simulation.
//!
//! This crate is the single source of truth for the data model that flows
//! between the event store, the decision engine, and the agents. It holds
//! pure data: construction and validation, no simulation behavior.
//!
//! # Modules
//!
//! - [`ids`] -- Identifier types: UUID-backed event ids and roster-configured
//!   agent ids.
//! - [`events`] -- Immutable [`Event`] records and payload validation.
//! - [`commands`] -- The per-tick [`Command`] directive and its action
//!   vocabulary.
//! - [`snapshot`] -- The read-only [`EnvironmentSnapshot`] handed to the
//!   decision engine.
//!
//! [`Event`]: events::Event
//! [`Command`]: commands::Command
//! [`EnvironmentSnapshot`]: snapshot::EnvironmentSnapshot

pub mod commands;
pub mod events;
pub mod ids;
pub mod snapshot;

// Re-export all public types at crate root for convenience.
pub use commands::{COMMAND_SCHEMA_VERSION, Command, CommandAction};
pub use events::{PAYLOAD_MAX_DEPTH, PAYLOAD_MAX_KEY_LEN, Event, Payload, PayloadError, validate_payload};
pub use ids::{AgentId, EventId};
pub use snapshot::EnvironmentSnapshot;

//! Agent archetypes and command execution for the Vivarium simulation.
//!
//! An agent is an independently-addressable actor with private local state.
//! Its entire contract is one operation: accept a command, execute it, and
//! return exactly one feedback event -- including when execution fails
//! internally, in which case the feedback carries an error marker instead of
//! propagating the failure to the coordinator.
//!
//! # Modules
//!
//! - [`agent`] -- [`AgentActor`], the enum dispatch over archetypes.
//! - [`citizen`] -- The needs-driven citizen archetype (zones, needs,
//!   health, death).
//! - [`scripted`] -- A deterministic archetype driven by a step list, used
//!   to exercise fault and timeout paths.
//! - [`config`] -- [`NeedsConfig`], the tunable needs/vitals parameters.
//! - [`error`] -- [`AgentError`], recoverable execution failures.
//!
//! [`AgentActor`]: agent::AgentActor
//! [`NeedsConfig`]: config::NeedsConfig
//! [`AgentError`]: error::AgentError

pub mod agent;
pub mod citizen;
pub mod config;
pub mod error;
pub mod scripted;

pub use agent::AgentActor;
pub use citizen::{CitizenAgent, Need, NeedStatus, Needs, Zone, HEALTH_MAX, NEED_MAX};
pub use config::NeedsConfig;
pub use error::AgentError;
pub use scripted::{ScriptStep, ScriptedAgent};

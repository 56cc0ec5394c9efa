//! Event store, decision engine, and tick coordination for the Vivarium
//! simulation.
//!
//! This crate owns the per-tick control loop: snapshot the environment,
//! obtain one command per agent from the decision engine, dispatch the
//! commands concurrently, collect feedback, and merge it back into the
//! event store as a single atomic batch.
//!
//! # Modules
//!
//! - [`store`] -- The append-only in-memory [`EventStore`] and its
//!   snapshot view.
//! - [`decision`] -- [`InferenceProvider`], [`DecisionEngine`], and the
//!   no-op backfill that keeps command maps total.
//! - [`parse`] -- Layered recovery parsing of raw model output.
//! - [`prompt`] -- Prompt template rendering via `minijinja`.
//! - [`coordinator`] -- The tick state machine and per-tick protocol.
//! - [`operator`] -- Shared runtime controls (stop, pause, speed, event
//!   injection).
//! - [`runner`] -- The bounded simulation loop.
//! - [`config`] -- Typed configuration loaded from `vivarium-config.yaml`.
//!
//! [`EventStore`]: store::EventStore
//! [`InferenceProvider`]: decision::InferenceProvider
//! [`DecisionEngine`]: decision::DecisionEngine

pub mod config;
pub mod coordinator;
pub mod decision;
pub mod operator;
pub mod parse;
pub mod prompt;
pub mod runner;
pub mod store;

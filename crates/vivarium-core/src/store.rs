//! The append-only event store and its snapshot view.
//!
//! Events are the source of truth for the simulation's history. The store
//! is an ordered in-memory sequence: insertion order is causal order, and
//! nothing is ever deleted within a run (truncation and archival belong to
//! an external persistence collaborator).
//!
//! The store is the only mutable shared state in the simulation, and every
//! write goes through the coordinator's merge step -- agents and the
//! decision engine never hold a reference to it. That single-writer
//! discipline is what makes the snapshot barrier trivial: a snapshot taken
//! before a merge can never observe half of that merge.

use tracing::debug;
use vivarium_types::events::{Event, PayloadError};
use vivarium_types::ids::EventId;
use vivarium_types::snapshot::EnvironmentSnapshot;

/// Errors that can occur when writing to the event store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The event payload failed validation; the event was discarded.
    #[error("invalid event payload: {source}")]
    Validation {
        /// The underlying payload rule violation.
        #[from]
        source: PayloadError,
    },
}

/// An ordered, append-only sequence of events.
#[derive(Debug, Clone, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    /// Create an empty store.
    pub const fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Number of events stored.
    pub const fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the store holds no events.
    pub const fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Append a single validated event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] if the payload is malformed; the
    /// event is discarded and the store is unchanged.
    pub fn append(&mut self, event: Event) -> Result<EventId, StoreError> {
        event.validate()?;
        let id = event.id;
        self.events.push(event);
        Ok(id)
    }

    /// Append a batch of events, all-or-nothing.
    ///
    /// Every event is validated before any is appended, so a rejected batch
    /// leaves the store untouched and an accepted batch lands contiguously.
    /// Snapshot consumers therefore never observe a half-applied tick.
    ///
    /// # Errors
    ///
    /// Returns the first [`StoreError::Validation`] encountered, in which
    /// case nothing was appended.
    pub fn append_batch(&mut self, events: Vec<Event>) -> Result<usize, StoreError> {
        for event in &events {
            event.validate()?;
        }
        let appended = events.len();
        self.events.extend(events);
        debug!(count = appended, total = self.events.len(), "Merged event batch");
        Ok(appended)
    }

    /// Build a read-only snapshot of the most recent `window` events
    /// (0 = all events), labeled with the tick it was built for.
    ///
    /// Pure: given the same stored sequence and the same window, the
    /// returned snapshot is identical call after call.
    pub fn snapshot(&self, tick: u64, window: usize) -> EnvironmentSnapshot {
        let start = if window == 0 {
            0
        } else {
            self.events.len().saturating_sub(window)
        };
        let events = self.events.get(start..).unwrap_or_default().to_vec();
        EnvironmentSnapshot {
            tick,
            window,
            events,
        }
    }

    /// Iterate over all stored events in append order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }
}

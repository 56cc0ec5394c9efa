//! The simulation coordinator: tick state machine and per-tick protocol.
//!
//! The coordinator is single-flow -- exactly one tick is in progress at a
//! time -- and the tick boundary is a synchronization barrier. Each tick
//! runs, in order:
//!
//! 1. Build a snapshot from the event store.
//! 2. Call the decision engine once with the snapshot and the full roster.
//! 3. Dispatch each command to its agent; agents run concurrently, each
//!    under the per-agent timeout. A timed-out agent's in-flight execution
//!    is abandoned and a synthesized timeout feedback takes its place.
//! 4. Collect one feedback event per agent.
//! 5. Merge staged environment events plus all feedback into the store as
//!    one atomic batch. Nothing merged here is visible to this tick's
//!    snapshot; all of it is visible to the next.
//! 6. Advance the tick counter and emit the tick summary.
//!
//! Fatal versus recoverable: total decision-engine failure halts the
//! coordinator (unless configured otherwise); malformed commands, agent
//! faults, and agent timeouts are absorbed with safe defaults and logged.
//! Every halt carries a [`HaltReason`] -- the coordinator never stops
//! silently.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use vivarium_agents::AgentActor;
use vivarium_types::commands::{Command, CommandAction};
use vivarium_types::events::{Event, Payload, validate_payload};
use vivarium_types::ids::AgentId;

use crate::decision::{DecisionEngine, DecisionError, DecisionOutcome, InferenceProvider};
use crate::store::{EventStore, StoreError};

/// Reason code attached to every transition into the halted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    /// The inference provider was unreachable or timed out.
    ProviderUnavailable,
    /// An external stop signal was honored at the tick boundary.
    StopRequested,
    /// The configured tick limit was reached.
    MaxTicksReached,
    /// The configured wall-clock limit was reached.
    MaxRealTimeReached,
    /// The store rejected a merge batch -- an internal invariant violation,
    /// since the coordinator validates everything it stages.
    StoreRejectedBatch,
    /// An internal invariant was violated (e.g. tick counter overflow).
    InvariantViolation,
}

impl HaltReason {
    /// The stable snake_case reason code for telemetry.
    pub const fn as_code(self) -> &'static str {
        match self {
            Self::ProviderUnavailable => "provider_unavailable",
            Self::StopRequested => "stop_requested",
            Self::MaxTicksReached => "max_ticks_reached",
            Self::MaxRealTimeReached => "max_real_time_reached",
            Self::StoreRejectedBatch => "store_rejected_batch",
            Self::InvariantViolation => "invariant_violation",
        }
    }
}

impl core::fmt::Display for HaltReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_code())
    }
}

/// The coordinator's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Created, no tick has run yet.
    Idle,
    /// At least one tick has run and the loop may continue.
    Ticking,
    /// Terminal. Entered on fatal error or an honored stop signal.
    Halted(HaltReason),
}

/// Per-tick telemetry emitted to the presentation boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    /// The tick that just completed.
    pub tick: u64,
    /// Commands in the post-backfill map (always the roster size).
    pub commands_issued: usize,
    /// Commands synthesized because model output was missing or malformed.
    pub noops_backfilled: usize,
    /// Model output entries dropped for targeting unknown agents.
    pub unknown_targets: usize,
    /// Feedback events merged this tick (always the roster size).
    pub feedback_received: usize,
    /// Agents whose execution was abandoned at the timeout.
    pub agent_timeouts: usize,
    /// Agents whose feedback carried an error marker.
    pub agent_errors: usize,
    /// Agents alive after the tick.
    pub agents_alive: usize,
    /// Total events in the store after the merge.
    pub events_total: usize,
}

/// Errors surfaced by [`Coordinator::run_tick`].
///
/// A returned error means the tick did not complete; the coordinator has
/// already transitioned to [`CoordinatorState::Halted`] where the error is
/// fatal.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// The decision engine failed for the whole tick.
    #[error("decision engine failed: {source}")]
    Decision {
        /// The underlying decision error.
        #[from]
        source: DecisionError,
    },

    /// The store rejected the merge batch.
    #[error("event store rejected merge batch: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: StoreError,
    },

    /// `run_tick` was called on a halted coordinator.
    #[error("coordinator is halted: {reason}")]
    Halted {
        /// Why the coordinator halted.
        reason: HaltReason,
    },

    /// The tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,
}

/// Orchestrates ticks over a fixed roster of agents.
#[derive(Debug)]
pub struct Coordinator<P> {
    store: EventStore,
    engine: DecisionEngine<P>,
    agents: BTreeMap<AgentId, AgentActor>,
    roster: Vec<AgentId>,
    state: CoordinatorState,
    tick: u64,
    tick_timeout_ms: u64,
    snapshot_window: usize,
    halt_on_decision_failure: bool,
    staged_payloads: Vec<Payload>,
}

impl<P: InferenceProvider> Coordinator<P> {
    /// Create a coordinator over a fixed set of agents.
    ///
    /// The roster is derived from the agents' ids; it never changes for
    /// the lifetime of the run.
    pub fn new(
        engine: DecisionEngine<P>,
        agents: Vec<AgentActor>,
        tick_timeout_ms: u64,
        snapshot_window: usize,
        halt_on_decision_failure: bool,
    ) -> Self {
        let agents: BTreeMap<AgentId, AgentActor> = agents
            .into_iter()
            .map(|actor| (actor.id().clone(), actor))
            .collect();
        let roster: Vec<AgentId> = agents.keys().cloned().collect();
        Self {
            store: EventStore::new(),
            engine,
            agents,
            roster,
            state: CoordinatorState::Idle,
            tick: 0,
            tick_timeout_ms,
            snapshot_window,
            halt_on_decision_failure,
            staged_payloads: Vec::new(),
        }
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> CoordinatorState {
        self.state
    }

    /// The last completed tick number (0 before the first tick).
    pub const fn current_tick(&self) -> u64 {
        self.tick
    }

    /// The fixed agent roster, in stable order.
    pub fn roster(&self) -> &[AgentId] {
        &self.roster
    }

    /// Read access to the event store.
    pub const fn store(&self) -> &EventStore {
        &self.store
    }

    /// Look up an agent by id.
    pub fn agent(&self, id: &AgentId) -> Option<&AgentActor> {
        self.agents.get(id)
    }

    /// Transition to the halted state with the given reason.
    ///
    /// Idempotent: a coordinator that is already halted keeps its original
    /// reason.
    pub fn halt(&mut self, reason: HaltReason) {
        if let CoordinatorState::Halted(existing) = self.state {
            warn!(
                existing = existing.as_code(),
                requested = reason.as_code(),
                "Coordinator already halted"
            );
            return;
        }
        info!(reason = reason.as_code(), "Coordinator halted");
        self.state = CoordinatorState::Halted(reason);
    }

    /// Stage an environment-originated payload for the next tick's merge.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] for a malformed payload; nothing
    /// is staged and the simulation proceeds without it.
    pub fn inject_environment(&mut self, payload: Payload) -> Result<(), StoreError> {
        validate_payload(&payload)?;
        self.staged_payloads.push(payload);
        Ok(())
    }

    /// Run one complete tick of the per-tick protocol.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError`] when the tick could not complete. For
    /// fatal conditions (decision failure under the halting policy, store
    /// batch rejection) the coordinator has already transitioned to
    /// [`CoordinatorState::Halted`] with the matching reason.
    pub async fn run_tick(&mut self) -> Result<TickSummary, CoordinatorError> {
        if let CoordinatorState::Halted(reason) = self.state {
            return Err(CoordinatorError::Halted { reason });
        }
        self.state = CoordinatorState::Ticking;

        let tick = self
            .tick
            .checked_add(1)
            .ok_or(CoordinatorError::TickOverflow)?;

        // --- 1. Snapshot (reflects everything merged through tick-1) ---
        let snapshot = self.store.snapshot(tick, self.snapshot_window);

        // --- 2. Decide ---
        let outcome = match self.engine.decide(&snapshot, &self.roster).await {
            Ok(outcome) => outcome,
            Err(decision_error) => {
                if self.halt_on_decision_failure {
                    error!(tick, error = %decision_error, "Decision engine unavailable, halting");
                    self.state = CoordinatorState::Halted(HaltReason::ProviderUnavailable);
                    return Err(decision_error.into());
                }
                warn!(tick, error = %decision_error, "Decision engine unavailable, running tick on no-ops");
                DecisionOutcome::all_no_op(&self.roster, &decision_error.to_string())
            }
        };

        if !outcome.is_complete() {
            warn!(
                tick,
                gaps = outcome.gaps.len(),
                "Decision incomplete, no-ops backfilled"
            );
        }
        for target in &outcome.unknown_targets {
            error!(tick, target = %target, "Dropped command for unknown agent");
        }

        // --- 3 + 4. Dispatch concurrently, collect feedback ---
        let (feedback, agent_timeouts, agent_errors) =
            dispatch_commands(&mut self.agents, &outcome.commands, tick, self.tick_timeout_ms)
                .await;
        let feedback_received = feedback.len();

        // --- 5. Merge staged environment events + feedback atomically ---
        let mut batch: Vec<Event> = std::mem::take(&mut self.staged_payloads)
            .into_iter()
            .map(|payload| Event::environment(tick, payload))
            .collect();
        batch.extend(feedback);

        if let Err(store_error) = self.store.append_batch(batch) {
            error!(tick, error = %store_error, "Merge batch rejected by store");
            self.state = CoordinatorState::Halted(HaltReason::StoreRejectedBatch);
            return Err(store_error.into());
        }

        // --- 6. Advance ---
        self.tick = tick;
        let agents_alive = self.agents.values().filter(|a| a.is_alive()).count();
        let summary = TickSummary {
            tick,
            commands_issued: outcome.commands.len(),
            noops_backfilled: outcome.gaps.len(),
            unknown_targets: outcome.unknown_targets.len(),
            feedback_received,
            agent_timeouts,
            agent_errors,
            agents_alive,
            events_total: self.store.len(),
        };
        info!(
            tick,
            commands = summary.commands_issued,
            backfilled = summary.noops_backfilled,
            feedback = summary.feedback_received,
            timeouts = summary.agent_timeouts,
            errors = summary.agent_errors,
            alive = summary.agents_alive,
            "Tick complete"
        );
        Ok(summary)
    }
}

/// Dispatch one command to every agent concurrently, each under the
/// per-agent timeout, and collect exactly one feedback event per agent.
///
/// Returns the feedback plus the timeout and error counts for telemetry.
async fn dispatch_commands(
    agents: &mut BTreeMap<AgentId, AgentActor>,
    commands: &BTreeMap<AgentId, Command>,
    tick: u64,
    tick_timeout_ms: u64,
) -> (Vec<Event>, usize, usize) {
    let timeout = Duration::from_millis(tick_timeout_ms);

    let dispatch = agents.iter_mut().map(|(id, actor)| {
        // The decision outcome is total over the roster; the fallback here
        // is unreachable in practice but keeps dispatch infallible.
        let command = commands
            .get(id)
            .cloned()
            .unwrap_or_else(|| Command::no_op(id.clone()));
        async move {
            let received = tokio::time::timeout(timeout, actor.receive(&command, tick)).await;
            (command, received)
        }
    });

    let results = futures::future::join_all(dispatch).await;

    let mut feedback = Vec::with_capacity(results.len());
    let mut agent_timeouts = 0usize;
    let mut agent_errors = 0usize;

    for (command, received) in results {
        match received {
            Ok(event) => {
                let errored = event
                    .payload
                    .get("error")
                    .and_then(serde_json::Value::as_bool)
                    == Some(true);
                if errored {
                    agent_errors = agent_errors.saturating_add(1);
                }
                feedback.push(event);
            }
            Err(_elapsed) => {
                warn!(
                    tick,
                    agent_id = %command.target,
                    timeout_ms = tick_timeout_ms,
                    "Agent timed out, abandoning in-flight execution"
                );
                agent_timeouts = agent_timeouts.saturating_add(1);
                feedback.push(Event::feedback(
                    tick,
                    command.target.clone(),
                    timeout_payload(command.action),
                ));
            }
        }
    }

    (feedback, agent_timeouts, agent_errors)
}

/// The synthesized feedback payload for an agent that exceeded the timeout.
fn timeout_payload(action: CommandAction) -> Payload {
    let mut payload = Payload::new();
    payload.insert("action".to_owned(), serde_json::json!(action.as_str()));
    payload.insert("error".to_owned(), serde_json::json!(true));
    payload.insert("reason".to_owned(), serde_json::json!("timeout"));
    payload
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use vivarium_agents::scripted::{ScriptStep, ScriptedAgent};

    use super::*;
    use crate::decision::StubProvider;
    use crate::prompt::PromptEngine;

    fn scripted_roster(ids: &[&str]) -> Vec<AgentActor> {
        ids.iter()
            .map(|id| AgentActor::Scripted(ScriptedAgent::always_ok(AgentId::new(*id))))
            .collect()
    }

    fn coordinator_with(
        response: &str,
        agents: Vec<AgentActor>,
    ) -> Coordinator<StubProvider> {
        let engine = DecisionEngine::new(
            StubProvider::new(response.to_owned()),
            PromptEngine::builtin().unwrap(),
            1_000,
            0,
        );
        Coordinator::new(engine, agents, 500, 16, true)
    }

    #[tokio::test]
    async fn tick_merges_one_feedback_per_agent() {
        let mut coordinator = coordinator_with("{}", scripted_roster(&["a1", "a2", "a3"]));

        let summary = coordinator.run_tick().await.unwrap();

        assert_eq!(summary.tick, 1);
        assert_eq!(summary.commands_issued, 3);
        assert_eq!(summary.feedback_received, 3);
        assert_eq!(coordinator.store().len(), 3);
        assert_eq!(coordinator.state(), CoordinatorState::Ticking);
    }

    #[tokio::test]
    async fn merge_is_invisible_to_own_tick_but_visible_to_next() {
        let mut coordinator = coordinator_with("{}", scripted_roster(&["a1"]));

        coordinator.run_tick().await.unwrap();
        // The snapshot for tick 1 was built from an empty store; the store
        // now holds tick-1 feedback, which tick 2's snapshot must see.
        let snapshot_for_next = coordinator.store().snapshot(2, 0);
        assert_eq!(snapshot_for_next.len(), 1);
        assert_eq!(snapshot_for_next.events.first().map(|e| e.tick), Some(1));
    }

    #[tokio::test]
    async fn injected_payload_lands_with_the_merge() {
        let mut coordinator = coordinator_with("{}", scripted_roster(&["a1"]));
        let mut payload = Payload::new();
        payload.insert("kind".to_owned(), serde_json::json!("heatwave"));
        coordinator.inject_environment(payload).unwrap();

        coordinator.run_tick().await.unwrap();

        let environment_events: Vec<&Event> = coordinator
            .store()
            .iter()
            .filter(|e| !e.is_feedback())
            .collect();
        assert_eq!(environment_events.len(), 1);
        assert_eq!(environment_events.first().map(|e| e.tick), Some(1));
    }

    #[tokio::test]
    async fn malformed_injection_is_rejected_up_front() {
        let mut coordinator = coordinator_with("{}", scripted_roster(&["a1"]));
        let mut payload = Payload::new();
        payload.insert(String::new(), serde_json::json!(1));

        assert!(coordinator.inject_environment(payload).is_err());
        coordinator.run_tick().await.unwrap();
        // Only the agent's feedback was merged.
        assert_eq!(coordinator.store().len(), 1);
    }

    #[tokio::test]
    async fn agent_timeout_synthesizes_feedback() {
        let slow = AgentActor::Scripted(ScriptedAgent::new(
            AgentId::new("slow"),
            vec![ScriptStep::Delay { millis: 5_000 }],
        ));
        let ok = AgentActor::Scripted(ScriptedAgent::always_ok(AgentId::new("ok")));
        let mut coordinator = coordinator_with("{}", vec![slow, ok]);

        let summary = coordinator.run_tick().await.unwrap();

        assert_eq!(summary.feedback_received, 2);
        assert_eq!(summary.agent_timeouts, 1);
        let timed_out = coordinator
            .store()
            .iter()
            .find(|e| e.source_agent_id == Some(AgentId::new("slow")))
            .unwrap();
        assert_eq!(
            timed_out.payload.get("reason"),
            Some(&serde_json::json!("timeout"))
        );
        assert_eq!(coordinator.state(), CoordinatorState::Ticking);
    }

    #[tokio::test]
    async fn halted_coordinator_refuses_ticks() {
        let mut coordinator = coordinator_with("{}", scripted_roster(&["a1"]));
        coordinator.halt(HaltReason::StopRequested);

        let error = coordinator.run_tick().await.unwrap_err();
        assert!(matches!(
            error,
            CoordinatorError::Halted {
                reason: HaltReason::StopRequested
            }
        ));
    }

    #[tokio::test]
    async fn halt_keeps_first_reason() {
        let mut coordinator = coordinator_with("{}", scripted_roster(&["a1"]));
        coordinator.halt(HaltReason::MaxTicksReached);
        coordinator.halt(HaltReason::StopRequested);
        assert_eq!(
            coordinator.state(),
            CoordinatorState::Halted(HaltReason::MaxTicksReached)
        );
    }

    #[test]
    fn halt_reason_codes_are_snake_case() {
        assert_eq!(HaltReason::ProviderUnavailable.as_code(), "provider_unavailable");
        assert_eq!(HaltReason::StopRequested.as_code(), "stop_requested");
        assert_eq!(
            serde_json::to_string(&HaltReason::ProviderUnavailable).unwrap(),
            "\"provider_unavailable\""
        );
    }
}

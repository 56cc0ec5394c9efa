//! The bounded simulation loop.
//!
//! [`run_simulation`] wraps the coordinator's single-tick protocol with the
//! control plane: pause/resume gates, stop requests, tick and wall-clock
//! limits, operator event injection, and the per-tick observer callback.
//! Whatever ends the run, the result carries the halt reason -- the loop
//! never exits silently.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::coordinator::{Coordinator, CoordinatorError, CoordinatorState, HaltReason, TickSummary};
use crate::decision::InferenceProvider;
use crate::operator::OperatorState;

/// Result of a completed simulation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationResult {
    /// Why the simulation ended.
    pub end_reason: HaltReason,
    /// The last tick summary, if any tick completed.
    pub final_summary: Option<TickSummary>,
    /// Total number of ticks executed.
    pub total_ticks: u64,
}

/// Callback invoked after each tick completes.
///
/// Implementations forward the summary to the presentation/telemetry
/// boundary: a structured log line, a metrics emitter, a dashboard feed.
pub trait TickCallback: Send {
    /// Called after a tick completes successfully.
    fn on_tick(&mut self, summary: &TickSummary);
}

/// A no-op tick callback for testing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _summary: &TickSummary) {}
}

/// Run the simulation loop until a termination condition is met.
///
/// Terminations: operator stop, wall-clock limit, tick limit, or a fatal
/// coordinator error (decision engine unavailable under the halting
/// policy, store batch rejection). In every case the coordinator ends in
/// [`CoordinatorState::Halted`] and the returned result carries the
/// matching [`HaltReason`].
pub async fn run_simulation<P: InferenceProvider>(
    coordinator: &mut Coordinator<P>,
    operator: &Arc<OperatorState>,
    callback: &mut dyn TickCallback,
) -> SimulationResult {
    let mut last_summary: Option<TickSummary> = None;
    let mut total_ticks: u64 = 0;

    info!(
        roster = coordinator.roster().len(),
        max_ticks = operator.max_ticks(),
        max_real_time_seconds = operator.max_real_time_seconds(),
        tick_interval_ms = operator.tick_interval_ms(),
        "Simulation starting"
    );

    loop {
        // --- Pause gate ---
        if operator.is_paused() {
            info!("Simulation paused, waiting for resume...");
            operator.wait_if_paused().await;
            info!("Simulation resumed");
        }

        // --- Stop request (honored at the tick boundary) ---
        if operator.is_stop_requested() {
            info!("Operator stop requested");
            coordinator.halt(HaltReason::StopRequested);
            return conclude(operator, HaltReason::StopRequested, last_summary, total_ticks)
                .await;
        }

        // --- Wall-clock limit ---
        if operator.time_limit_reached() {
            info!(
                max_seconds = operator.max_real_time_seconds(),
                elapsed = operator.elapsed_seconds(),
                "Real-time limit reached"
            );
            coordinator.halt(HaltReason::MaxRealTimeReached);
            return conclude(operator, HaltReason::MaxRealTimeReached, last_summary, total_ticks)
                .await;
        }

        // --- Stage operator-injected environment events ---
        for payload in operator.drain_injected_payloads().await {
            if let Err(injection_error) = coordinator.inject_environment(payload) {
                warn!(error = %injection_error, "Injected payload rejected, discarded");
            }
        }

        // --- Execute tick ---
        match coordinator.run_tick().await {
            Ok(summary) => {
                total_ticks = total_ticks.saturating_add(1);
                callback.on_tick(&summary);

                if operator.tick_limit_reached(summary.tick) {
                    info!(
                        tick = summary.tick,
                        max_ticks = operator.max_ticks(),
                        "Tick limit reached"
                    );
                    coordinator.halt(HaltReason::MaxTicksReached);
                    return conclude(
                        operator,
                        HaltReason::MaxTicksReached,
                        Some(summary),
                        total_ticks,
                    )
                    .await;
                }

                last_summary = Some(summary);
            }
            Err(tick_error) => {
                let reason = fatal_reason(coordinator, &tick_error);
                error!(error = %tick_error, reason = reason.as_code(), "Simulation halted");
                return conclude(operator, reason, last_summary, total_ticks).await;
            }
        }

        // --- Inter-tick sleep ---
        let interval_ms = operator.tick_interval_ms();
        if interval_ms > 0 {
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
        }
    }
}

/// Resolve the halt reason after a fatal tick error, making sure the
/// coordinator actually ends up halted.
fn fatal_reason<P: InferenceProvider>(
    coordinator: &mut Coordinator<P>,
    tick_error: &CoordinatorError,
) -> HaltReason {
    if let CoordinatorState::Halted(reason) = coordinator.state() {
        return reason;
    }
    // The coordinator did not classify the failure itself (e.g. tick
    // counter overflow); treat it as an invariant violation.
    let reason = match tick_error {
        CoordinatorError::Halted { reason } => *reason,
        _ => HaltReason::InvariantViolation,
    };
    coordinator.halt(reason);
    reason
}

/// Record the end reason with the operator and build the result.
async fn conclude(
    operator: &Arc<OperatorState>,
    end_reason: HaltReason,
    final_summary: Option<TickSummary>,
    total_ticks: u64,
) -> SimulationResult {
    operator.set_end_reason(end_reason).await;
    SimulationResult {
        end_reason,
        final_summary,
        total_ticks,
    }
}

/// Log the simulation end sequence.
///
/// Call after [`run_simulation`] returns; the embedding process decides
/// what happens next (exit, restart, keep serving telemetry).
pub fn log_simulation_end(result: &SimulationResult) {
    info!(
        reason = result.end_reason.as_code(),
        total_ticks = result.total_ticks,
        final_tick = result.final_summary.as_ref().map(|s| s.tick),
        "Simulation ended"
    );

    if let Some(ref summary) = result.final_summary {
        info!(
            tick = summary.tick,
            feedback = summary.feedback_received,
            agents_alive = summary.agents_alive,
            events_total = summary.events_total,
            "Final tick summary"
        );
    } else {
        warn!("Simulation ended with no ticks executed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use vivarium_agents::AgentActor;
    use vivarium_agents::scripted::ScriptedAgent;
    use vivarium_types::ids::AgentId;

    use super::*;
    use crate::decision::{DecisionEngine, StubProvider};
    use crate::prompt::PromptEngine;

    fn coordinator(agent_ids: &[&str]) -> Coordinator<StubProvider> {
        let engine = DecisionEngine::new(
            StubProvider::empty(),
            PromptEngine::builtin().unwrap(),
            1_000,
            0,
        );
        let agents = agent_ids
            .iter()
            .map(|id| AgentActor::Scripted(ScriptedAgent::always_ok(AgentId::new(*id))))
            .collect();
        Coordinator::new(engine, agents, 500, 16, true)
    }

    #[tokio::test]
    async fn bounded_by_max_ticks() {
        let mut coordinator = coordinator(&["a1"]);
        let operator = Arc::new(OperatorState::new(0, 5, 0));
        let mut callback = NoOpCallback;

        let result = run_simulation(&mut coordinator, &operator, &mut callback).await;

        assert_eq!(result.end_reason, HaltReason::MaxTicksReached);
        assert_eq!(result.total_ticks, 5);
        assert_eq!(
            coordinator.state(),
            CoordinatorState::Halted(HaltReason::MaxTicksReached)
        );
        assert_eq!(operator.end_reason().await, Some(HaltReason::MaxTicksReached));
    }

    #[tokio::test]
    async fn stop_before_first_tick() {
        let mut coordinator = coordinator(&["a1"]);
        let operator = Arc::new(OperatorState::new(0, 0, 0));
        operator.request_stop();
        let mut callback = NoOpCallback;

        let result = run_simulation(&mut coordinator, &operator, &mut callback).await;

        assert_eq!(result.end_reason, HaltReason::StopRequested);
        assert_eq!(result.total_ticks, 0);
        assert!(result.final_summary.is_none());
    }

    #[tokio::test]
    async fn callback_sees_every_tick() {
        struct CountCallback {
            count: u64,
        }
        impl TickCallback for CountCallback {
            fn on_tick(&mut self, _summary: &TickSummary) {
                self.count = self.count.saturating_add(1);
            }
        }

        let mut coordinator = coordinator(&["a1", "a2"]);
        let operator = Arc::new(OperatorState::new(0, 3, 0));
        let mut callback = CountCallback { count: 0 };

        let _ = run_simulation(&mut coordinator, &operator, &mut callback).await;

        assert_eq!(callback.count, 3);
    }

    #[tokio::test]
    async fn injected_payloads_reach_the_store() {
        let mut coordinator = coordinator(&["a1"]);
        let operator = Arc::new(OperatorState::new(0, 1, 0));
        let mut payload = vivarium_types::events::Payload::new();
        payload.insert("kind".to_owned(), serde_json::json!("heatwave"));
        operator.inject_payload(payload).await;
        let mut callback = NoOpCallback;

        let _ = run_simulation(&mut coordinator, &operator, &mut callback).await;

        let environment_events = coordinator
            .store()
            .iter()
            .filter(|e| !e.is_feedback())
            .count();
        assert_eq!(environment_events, 1);
    }
}

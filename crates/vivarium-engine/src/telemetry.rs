//! Per-tick telemetry at the presentation boundary.
//!
//! The coordinator's tick summaries leave the core through the
//! [`TickCallback`] hook; this implementation turns each one into a
//! structured log line. Anything richer (metrics, dashboards) plugs in at
//! the same seam without touching the loop.

use tracing::info;
use vivarium_core::coordinator::TickSummary;
use vivarium_core::runner::TickCallback;

/// A callback that logs every tick summary as structured fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogCallback;

impl TickCallback for LogCallback {
    fn on_tick(&mut self, summary: &TickSummary) {
        info!(
            target: "vivarium::telemetry",
            tick = summary.tick,
            commands_issued = summary.commands_issued,
            noops_backfilled = summary.noops_backfilled,
            unknown_targets = summary.unknown_targets,
            feedback_received = summary.feedback_received,
            agent_timeouts = summary.agent_timeouts,
            agent_errors = summary.agent_errors,
            agents_alive = summary.agents_alive,
            events_total = summary.events_total,
            "tick summary"
        );
    }
}

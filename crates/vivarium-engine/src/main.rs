//! Simulation engine binary for Vivarium.
//!
//! This is the entry point that wires together the event store, decision
//! engine, agent roster, operator controls, and telemetry, then runs the
//! tick loop until a termination condition is met.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `vivarium-config.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Build the prompt engine (directory override or compiled-in defaults)
//! 4. Construct the HTTP inference backend
//! 5. Spawn the citizen roster with seeded initial needs
//! 6. Assemble the coordinator and operator state
//! 7. Install the stop-signal handler (Ctrl-C)
//! 8. Run the simulation loop
//! 9. Log the result

mod error;
mod llm;
mod telemetry;

use std::path::Path;
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vivarium_agents::citizen::CitizenAgent;
use vivarium_agents::AgentActor;
use vivarium_core::config::SimulationConfig;
use vivarium_core::coordinator::Coordinator;
use vivarium_core::decision::DecisionEngine;
use vivarium_core::operator::OperatorState;
use vivarium_core::prompt::PromptEngine;
use vivarium_core::runner;
use vivarium_types::ids::AgentId;

use crate::error::EngineError;
use crate::llm::LlmBackend;
use crate::telemetry::LogCallback;

/// Application entry point for the simulation engine.
///
/// # Errors
///
/// Returns an error if any wiring step fails; the tick loop itself ends
/// through halt reasons, not errors.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging. RUST_LOG wins over the config file.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .with_target(true)
        .init();

    info!("vivarium-engine starting");
    info!(
        world_name = config.world.name,
        seed = config.world.seed,
        tick_interval_ms = config.simulation.tick_interval_ms,
        tick_timeout_ms = config.coordination.tick_timeout_ms,
        snapshot_window = config.coordination.snapshot_window,
        "Configuration loaded"
    );

    // 3. Build the prompt engine.
    let prompts = match config.inference.templates_dir.as_deref() {
        Some(dir) => PromptEngine::from_dir(dir).map_err(EngineError::from)?,
        None => PromptEngine::builtin().map_err(EngineError::from)?,
    };

    // 4. Construct the inference backend.
    let backend = LlmBackend::from_config(&config.inference);
    info!(
        backend = backend.name(),
        api_url = config.inference.api_url,
        model = config.inference.model,
        request_timeout_ms = config.inference.request_timeout_ms,
        "Inference backend ready"
    );

    let engine = DecisionEngine::new(
        backend,
        prompts,
        config.inference.request_timeout_ms,
        config.inference.max_retries,
    );

    // 5. Spawn the citizen roster with seeded initial needs.
    let mut rng = StdRng::seed_from_u64(config.world.seed);
    let agents: Vec<AgentActor> = config
        .roster
        .iter()
        .map(|entry| {
            let name = if entry.name.is_empty() {
                entry.id.clone()
            } else {
                entry.name.clone()
            };
            AgentActor::Citizen(CitizenAgent::with_random_needs(
                AgentId::new(entry.id.clone()),
                name,
                config.needs.clone(),
                &mut rng,
            ))
        })
        .collect();
    info!(agents = agents.len(), "Roster spawned");

    // 6. Assemble the coordinator and operator state.
    let mut coordinator = Coordinator::new(
        engine,
        agents,
        config.coordination.tick_timeout_ms,
        config.coordination.snapshot_window,
        config.simulation.halt_on_decision_failure,
    );
    let operator = Arc::new(OperatorState::new(
        config.simulation.tick_interval_ms,
        config.simulation.max_ticks,
        config.simulation.max_real_time_seconds,
    ));

    // 7. Honor Ctrl-C as a stop request at the next tick boundary.
    let stop_operator = Arc::clone(&operator);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Stop signal received, halting at the next tick boundary");
            stop_operator.request_stop();
        }
    });

    // 8. Run the simulation.
    let mut callback = LogCallback;
    let result = runner::run_simulation(&mut coordinator, &operator, &mut callback).await;

    // 9. Log results.
    runner::log_simulation_end(&result);
    info!(
        end_reason = result.end_reason.as_code(),
        total_ticks = result.total_ticks,
        events_stored = coordinator.store().len(),
        "vivarium-engine shutdown complete"
    );

    Ok(())
}

/// Load the simulation configuration from `vivarium-config.yaml`.
///
/// Looks for the config file relative to the current working directory and
/// falls back to defaults when it is absent.
fn load_config() -> Result<SimulationConfig, EngineError> {
    let config_path = Path::new("vivarium-config.yaml");
    if config_path.exists() {
        Ok(SimulationConfig::from_file(config_path)?)
    } else {
        Ok(SimulationConfig::parse("{}")?)
    }
}

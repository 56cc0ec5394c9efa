//! The decision engine: one inference call per tick, one command per agent.
//!
//! The engine wraps an opaque [`InferenceProvider`] behind an adapter
//! boundary: the simulation loop never sees a model runtime, only a
//! `request in, raw text out` capability. Everything else -- prompt
//! encoding, timeout, retries, output parsing, validation, and the no-op
//! backfill that keeps the command map total -- is the engine's job.
//!
//! Failure posture: individual malformed entries degrade to no-ops and are
//! reported as [`DecisionGap`]s (non-fatal); only total provider failure
//! (unreachable, or deadline elapsed) surfaces as [`DecisionError`].

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use tracing::{debug, error, warn};
use vivarium_types::commands::Command;
use vivarium_types::ids::AgentId;
use vivarium_types::snapshot::EnvironmentSnapshot;

use crate::parse;
use crate::prompt::{PromptEngine, PromptError};

/// The encoded request handed to an inference provider.
///
/// Providers decide how to place the two parts (chat roles, ChatML
/// wrapping, plain concatenation); the engine only guarantees that
/// `system` holds the standing instructions and `user` the per-tick state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceRequest {
    /// Standing instructions for the model.
    pub system: String,
    /// The per-tick state and reply schema.
    pub user: String,
}

/// Errors an inference provider can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The provider could not be reached at all.
    #[error("inference provider unreachable: {message}")]
    Unreachable {
        /// Transport-level error text.
        message: String,
    },

    /// The provider answered, but not with a usable completion.
    #[error("inference provider error response: {message}")]
    Response {
        /// What was wrong with the response.
        message: String,
    },
}

/// An opaque inference capability: serialized state in, raw output out.
///
/// The engine is generic over the provider rather than holding a trait
/// object because the call is async and async methods are not
/// dyn-compatible.
pub trait InferenceProvider {
    /// Run one inference call.
    fn infer(
        &self,
        request: &InferenceRequest,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send;
}

/// Why an agent's command had to be backfilled with a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GapReason {
    /// The model output contained no entry for this agent.
    Missing,
    /// The entry existed but did not validate.
    Malformed {
        /// What was wrong with it.
        detail: String,
    },
    /// The provider failed entirely and the tick runs on no-ops.
    ProviderFailure {
        /// The provider error text.
        message: String,
    },
}

/// One backfilled agent in a decision outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionGap {
    /// The agent whose command was synthesized.
    pub agent_id: AgentId,
    /// Why the backfill happened.
    pub reason: GapReason,
}

/// The engine's product for one tick: a total command map plus the list of
/// gaps that had to be backfilled.
///
/// Post-backfill invariant: `commands` holds exactly one entry per roster
/// id -- no more, no less. A non-empty `gaps` list is the non-fatal
/// "decision incomplete" condition; callers log it and proceed.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionOutcome {
    /// Exactly one command per known agent.
    pub commands: BTreeMap<AgentId, Command>,
    /// Agents whose commands were backfilled, and why.
    pub gaps: Vec<DecisionGap>,
    /// Targets in the model output that matched no known agent; dropped.
    pub unknown_targets: Vec<String>,
}

impl DecisionOutcome {
    /// An outcome consisting solely of no-ops, used when the provider
    /// failed but the configuration says the show must go on.
    pub fn all_no_op(roster: &[AgentId], message: &str) -> Self {
        let commands = roster
            .iter()
            .map(|id| (id.clone(), Command::no_op(id.clone())))
            .collect();
        let gaps = roster
            .iter()
            .map(|id| DecisionGap {
                agent_id: id.clone(),
                reason: GapReason::ProviderFailure {
                    message: message.to_owned(),
                },
            })
            .collect();
        Self {
            commands,
            gaps,
            unknown_targets: Vec::new(),
        }
    }

    /// Whether every command came straight from the model.
    pub const fn is_complete(&self) -> bool {
        self.gaps.is_empty()
    }
}

/// Fatal decision failures: the provider is unavailable for this tick.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecisionError {
    /// Every attempt against the provider failed.
    #[error("inference provider unavailable after {attempts} attempt(s): {message}")]
    Provider {
        /// How many attempts were made.
        attempts: u32,
        /// The last provider error text.
        message: String,
    },

    /// The inference deadline elapsed.
    #[error("inference request timed out after {timeout_ms}ms")]
    Timeout {
        /// The configured deadline in milliseconds.
        timeout_ms: u64,
    },

    /// The prompt could not be rendered.
    #[error("failed to render decision prompt: {source}")]
    Prompt {
        /// The underlying template error.
        #[from]
        source: PromptError,
    },
}

/// Translates environment snapshots into per-agent commands via one
/// inference call per tick.
#[derive(Debug)]
pub struct DecisionEngine<P> {
    provider: P,
    prompts: PromptEngine,
    request_timeout_ms: u64,
    max_retries: u32,
}

impl<P: InferenceProvider> DecisionEngine<P> {
    /// Create an engine around a provider.
    pub const fn new(
        provider: P,
        prompts: PromptEngine,
        request_timeout_ms: u64,
        max_retries: u32,
    ) -> Self {
        Self {
            provider,
            prompts,
            request_timeout_ms,
            max_retries,
        }
    }

    /// Decide commands for every agent in `roster` given `snapshot`.
    ///
    /// Returns a total command map: exactly one command per roster id, with
    /// no-ops backfilled wherever the model output was missing or
    /// malformed. Unknown targets in the output are dropped and reported.
    ///
    /// # Errors
    ///
    /// Returns [`DecisionError`] only when the provider is unavailable
    /// (transport failure on every attempt, or deadline elapsed) or the
    /// prompt cannot be rendered.
    pub async fn decide(
        &self,
        snapshot: &EnvironmentSnapshot,
        roster: &[AgentId],
    ) -> Result<DecisionOutcome, DecisionError> {
        let request = self.prompts.render_decision_request(snapshot, roster)?;
        let raw = self.call_with_retries(&request).await?;
        debug!(tick = snapshot.tick, raw_len = raw.len(), "Inference response received");
        Ok(interpret_raw_output(&raw, roster))
    }

    /// Call the provider under the deadline, retrying transient failures.
    ///
    /// A timeout is not retried: the deadline bounds the whole decision
    /// phase, not a single attempt.
    async fn call_with_retries(
        &self,
        request: &InferenceRequest,
    ) -> Result<String, DecisionError> {
        let deadline = Duration::from_millis(self.request_timeout_ms);
        let attempts = self.max_retries.saturating_add(1);
        let mut last_message = String::new();

        for attempt in 1..=attempts {
            match tokio::time::timeout(deadline, self.provider.infer(request)).await {
                Ok(Ok(raw)) => return Ok(raw),
                Ok(Err(provider_error)) => {
                    warn!(attempt, error = %provider_error, "Inference attempt failed");
                    last_message = provider_error.to_string();
                }
                Err(_elapsed) => {
                    return Err(DecisionError::Timeout {
                        timeout_ms: self.request_timeout_ms,
                    });
                }
            }
        }

        Err(DecisionError::Provider {
            attempts,
            message: last_message,
        })
    }
}

/// Interpret raw model output into a total command map for `roster`.
///
/// Parsing failures degrade: unparseable output yields an all-no-op map
/// with one `Missing` gap per agent, and individually malformed entries
/// yield per-agent gaps.
fn interpret_raw_output(raw: &str, roster: &[AgentId]) -> DecisionOutcome {
    let known: BTreeSet<&AgentId> = roster.iter().collect();
    let mut commands: BTreeMap<AgentId, Command> = BTreeMap::new();
    let mut gaps: Vec<DecisionGap> = Vec::new();
    let mut unknown_targets: Vec<String> = Vec::new();

    match parse::parse_raw_output(raw) {
        Ok(raw_decision) => {
            for (target, raw_command) in raw_decision {
                let agent_id = AgentId::new(target.clone());
                if !known.contains(&agent_id) {
                    error!(target = %target, "Command for unknown agent id dropped");
                    unknown_targets.push(target);
                    continue;
                }
                match parse::to_command(&agent_id, &raw_command) {
                    Ok(command) => {
                        commands.insert(agent_id, command);
                    }
                    Err(detail) => {
                        warn!(agent_id = %agent_id, detail, "Malformed command entry");
                        gaps.push(DecisionGap {
                            agent_id,
                            reason: GapReason::Malformed { detail },
                        });
                    }
                }
            }
        }
        Err(parse_error) => {
            warn!(error = %parse_error, raw, "Model output unparseable, running tick on no-ops");
        }
    }

    // Backfill: every roster id ends up with exactly one command.
    let gapped: BTreeSet<AgentId> = gaps.iter().map(|gap| gap.agent_id.clone()).collect();
    for agent_id in roster {
        if commands.contains_key(agent_id) {
            continue;
        }
        commands.insert(agent_id.clone(), Command::no_op(agent_id.clone()));
        if !gapped.contains(agent_id) {
            gaps.push(DecisionGap {
                agent_id: agent_id.clone(),
                reason: GapReason::Missing,
            });
        }
    }

    DecisionOutcome {
        commands,
        gaps,
        unknown_targets,
    }
}

/// A provider that always answers with a fixed response.
///
/// Exercises the full decision path with no model attached; the default
/// response is an empty object, which backfills to all no-ops.
#[derive(Debug, Clone, Default)]
pub struct StubProvider {
    response: String,
}

impl StubProvider {
    /// A stub answering with the given raw response.
    pub const fn new(response: String) -> Self {
        Self { response }
    }

    /// A stub answering `{}` (every agent idles).
    pub fn empty() -> Self {
        Self::new(String::from("{}"))
    }
}

impl InferenceProvider for StubProvider {
    async fn infer(&self, _request: &InferenceRequest) -> Result<String, ProviderError> {
        Ok(self.response.clone())
    }
}

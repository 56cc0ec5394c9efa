//! The agent abstraction the coordinator dispatches to.
//!
//! Uses enum dispatch over archetypes instead of a trait object, for the
//! same reason the inference backends do: the receive operation is async,
//! and async methods are not dyn-compatible. Any archetype added here must
//! uphold the contract that every valid command -- including no-ops and
//! commands delivered after death -- yields exactly one feedback event.
//!
//! Agents never observe each other. The only channel between them is the
//! shared event store, and writes to it go through the coordinator's merge
//! step, never through the agents themselves.

use serde_json::json;
use tracing::warn;
use vivarium_types::commands::Command;
use vivarium_types::events::{Event, Payload};
use vivarium_types::ids::AgentId;

use crate::citizen::CitizenAgent;
use crate::error::AgentError;
use crate::scripted::ScriptedAgent;

/// An agent of any archetype, addressable by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentActor {
    /// The needs-driven citizen archetype.
    Citizen(CitizenAgent),
    /// The deterministic scripted archetype.
    Scripted(ScriptedAgent),
}

impl AgentActor {
    /// This agent's id.
    pub const fn id(&self) -> &AgentId {
        match self {
            Self::Citizen(agent) => agent.id(),
            Self::Scripted(agent) => agent.id(),
        }
    }

    /// Human-readable archetype name for logging.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Citizen(_) => "citizen",
            Self::Scripted(_) => "scripted",
        }
    }

    /// Whether the agent is alive. Scripted agents never die.
    pub const fn is_alive(&self) -> bool {
        match self {
            Self::Citizen(agent) => agent.is_alive(),
            Self::Scripted(_) => true,
        }
    }

    /// Receive one command and return exactly one feedback event.
    ///
    /// Recoverable execution errors are absorbed here: the returned
    /// feedback carries `error: true` and a reason instead of the
    /// observation payload. The coordinator never sees an `Err` from an
    /// agent.
    pub async fn receive(&mut self, command: &Command, tick: u64) -> Event {
        let result = match self {
            Self::Citizen(agent) => agent.execute(command),
            Self::Scripted(agent) => agent.execute(command).await,
        };

        let id = self.id().clone();
        match result {
            Ok(payload) => Event::feedback(tick, id, payload),
            Err(error) => {
                warn!(
                    tick,
                    agent_id = %id,
                    kind = self.kind(),
                    %error,
                    "Agent execution failed, reporting error feedback"
                );
                Event::feedback(tick, id, error_payload(command, &error))
            }
        }
    }
}

/// Build the error-marked payload for a failed execution.
fn error_payload(command: &Command, error: &AgentError) -> Payload {
    let mut payload = Payload::new();
    payload.insert("action".to_owned(), json!(command.action.as_str()));
    payload.insert("error".to_owned(), json!(true));
    payload.insert("reason".to_owned(), json!(error.to_string()));
    payload
}

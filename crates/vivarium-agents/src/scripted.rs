//! A deterministic agent archetype driven by a step list.
//!
//! Scripted agents exist for two reasons: tests need a way to provoke the
//! fault and timeout paths on demand, and a roster can be exercised
//! end-to-end without any needs mechanics attached. Each received command
//! consumes the next step; once the script runs out, every further command
//! succeeds.

use serde_json::json;
use vivarium_types::commands::Command;
use vivarium_types::events::Payload;
use vivarium_types::ids::AgentId;

use crate::error::AgentError;

/// One step of a scripted agent's behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// Acknowledge the command normally.
    Succeed,
    /// Fail with the given reason (surfaces as an error-marked feedback).
    Fail {
        /// The reason reported in the feedback payload.
        reason: String,
    },
    /// Sleep for the given duration, then acknowledge. Used to provoke the
    /// coordinator's per-agent timeout.
    Delay {
        /// How long to sleep before acknowledging.
        millis: u64,
    },
}

/// An agent that follows a pre-authored step list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedAgent {
    id: AgentId,
    steps: Vec<ScriptStep>,
    cursor: usize,
}

impl ScriptedAgent {
    /// Create a scripted agent with the given step list.
    pub const fn new(id: AgentId, steps: Vec<ScriptStep>) -> Self {
        Self {
            id,
            steps,
            cursor: 0,
        }
    }

    /// Create a scripted agent that acknowledges every command.
    pub const fn always_ok(id: AgentId) -> Self {
        Self::new(id, Vec::new())
    }

    /// This agent's id.
    pub const fn id(&self) -> &AgentId {
        &self.id
    }

    /// Execute one command according to the current script step.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ScriptedFault`] when the current step is
    /// [`ScriptStep::Fail`].
    pub async fn execute(&mut self, command: &Command) -> Result<Payload, AgentError> {
        let step = self.steps.get(self.cursor).cloned().unwrap_or(ScriptStep::Succeed);
        self.cursor = self.cursor.saturating_add(1);

        match step {
            ScriptStep::Succeed => Ok(acknowledgement(command, None)),
            ScriptStep::Fail { reason } => Err(AgentError::ScriptedFault { reason }),
            ScriptStep::Delay { millis } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(millis)).await;
                Ok(acknowledgement(command, Some(millis)))
            }
        }
    }
}

/// Build the payload a scripted agent acknowledges with.
fn acknowledgement(command: &Command, delayed_ms: Option<u64>) -> Payload {
    let mut payload = Payload::new();
    payload.insert("action".to_owned(), json!(command.action.as_str()));
    payload.insert("alive".to_owned(), json!(true));
    payload.insert("status".to_owned(), json!("ok"));
    if let Some(millis) = delayed_ms {
        payload.insert("delayed_ms".to_owned(), json!(millis));
    }
    payload
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use vivarium_types::commands::CommandAction;

    use super::*;

    fn idle() -> Command {
        Command::no_op(AgentId::new("s1"))
    }

    #[tokio::test]
    async fn empty_script_always_succeeds() {
        let mut agent = ScriptedAgent::always_ok(AgentId::new("s1"));
        for _ in 0..3 {
            let payload = agent.execute(&idle()).await.unwrap();
            assert_eq!(payload.get("status"), Some(&serde_json::json!("ok")));
        }
    }

    #[tokio::test]
    async fn fail_step_then_recovers() {
        let mut agent = ScriptedAgent::new(
            AgentId::new("s1"),
            vec![ScriptStep::Fail {
                reason: String::from("solenoid jam"),
            }],
        );

        let err = agent.execute(&idle()).await.unwrap_err();
        assert!(matches!(err, AgentError::ScriptedFault { .. }));

        // The script is exhausted; subsequent commands succeed.
        assert!(agent.execute(&idle()).await.is_ok());
    }

    #[tokio::test]
    async fn delay_step_reports_duration() {
        let mut agent = ScriptedAgent::new(
            AgentId::new("s1"),
            vec![ScriptStep::Delay { millis: 5 }],
        );
        let payload = agent.execute(&idle()).await.unwrap();
        assert_eq!(payload.get("delayed_ms"), Some(&serde_json::json!(5)));
    }

    #[tokio::test]
    async fn command_action_is_echoed() {
        let mut agent = ScriptedAgent::always_ok(AgentId::new("s1"));
        let command = Command::new(AgentId::new("s1"), CommandAction::GoPark);
        let payload = agent.execute(&command).await.unwrap();
        assert_eq!(payload.get("action"), Some(&serde_json::json!("go_park")));
    }
}

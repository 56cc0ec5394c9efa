//! Error types for agent command execution.
//!
//! Agent errors are always recoverable from the coordinator's point of
//! view: the agent layer converts them into feedback events with an error
//! marker, so a faulting agent never halts the simulation.

/// Errors that can occur while an agent executes a command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgentError {
    /// A need or health computation would overflow.
    #[error("arithmetic overflow: {context}")]
    ArithmeticOverflow {
        /// Which computation overflowed.
        context: String,
    },

    /// A scripted agent was instructed to fail this step.
    #[error("scripted fault: {reason}")]
    ScriptedFault {
        /// The failure reason from the script.
        reason: String,
    },
}

//! Error types for engine wiring.
//!
//! These cover startup failures only; once the tick loop is running, the
//! runner's halt reasons take over.

use vivarium_core::config::ConfigError;
use vivarium_core::prompt::PromptError;

/// Errors that can occur while wiring the engine together.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration failed to load or validate.
    #[error("config error: {source}")]
    Config {
        /// The underlying configuration error.
        #[from]
        source: ConfigError,
    },

    /// Prompt templates failed to load.
    #[error("prompt error: {source}")]
    Prompt {
        /// The underlying template error.
        #[from]
        source: PromptError,
    },
}

//! Configuration loading and typed config structures.
//!
//! The canonical configuration lives in `vivarium-config.yaml` at the
//! project root. This module defines strongly-typed structs that mirror the
//! YAML structure, with serde defaults for every field so a partial (or
//! absent) file still yields a runnable configuration.
//!
//! Environment variables override the inference endpoint so deployments can
//! point at a model server without editing the file:
//! `VIVARIUM_API_URL` and `VIVARIUM_API_KEY`.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;
use vivarium_agents::NeedsConfig;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but is not usable.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `vivarium-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// World-level settings (name, seed).
    #[serde(default)]
    pub world: WorldConfig,

    /// Loop bounds and pacing.
    #[serde(default)]
    pub simulation: SimulationBoundsConfig,

    /// Per-tick coordination parameters.
    #[serde(default)]
    pub coordination: CoordinationConfig,

    /// The fixed agent roster.
    #[serde(default = "default_roster")]
    pub roster: Vec<RosterEntry>,

    /// Needs/vitals mechanics parameters.
    #[serde(default)]
    pub needs: NeedsConfig,

    /// Inference provider settings.
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.inference.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints the type system cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on an empty roster, duplicate or
    /// empty agent ids, or zero timeouts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.roster.is_empty() {
            return Err(ConfigError::Invalid {
                reason: String::from("roster must contain at least one agent"),
            });
        }
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for entry in &self.roster {
            if entry.id.is_empty() {
                return Err(ConfigError::Invalid {
                    reason: String::from("agent ids must not be empty"),
                });
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(ConfigError::Invalid {
                    reason: format!("duplicate agent id '{}'", entry.id),
                });
            }
        }
        if self.coordination.tick_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: String::from("coordination.tick_timeout_ms must be at least 1"),
            });
        }
        if self.inference.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: String::from("inference.request_timeout_ms must be at least 1"),
            });
        }
        Ok(())
    }
}

/// World-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Human-readable simulation name.
    #[serde(default = "default_world_name")]
    pub name: String,

    /// Random seed for reproducible initial need levels.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: default_world_name(),
            seed: default_seed(),
        }
    }
}

/// Loop bounds and pacing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationBoundsConfig {
    /// Real-time milliseconds between ticks (0 = run flat out).
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Maximum number of ticks before the simulation ends (0 = unlimited).
    #[serde(default)]
    pub max_ticks: u64,

    /// Maximum wall-clock seconds before the simulation ends (0 = unlimited).
    #[serde(default = "default_max_real_time_seconds")]
    pub max_real_time_seconds: u64,

    /// Whether total decision-engine failure halts the run. When `false`,
    /// the failed tick runs entirely on no-ops instead.
    #[serde(default = "default_true")]
    pub halt_on_decision_failure: bool,
}

impl Default for SimulationBoundsConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            max_ticks: 0,
            max_real_time_seconds: default_max_real_time_seconds(),
            halt_on_decision_failure: true,
        }
    }
}

/// Per-tick coordination parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CoordinationConfig {
    /// Milliseconds each agent has to deliver feedback before its
    /// execution is abandoned.
    #[serde(default = "default_tick_timeout_ms")]
    pub tick_timeout_ms: u64,

    /// How many recent events each decision sees (0 = full history).
    #[serde(default = "default_snapshot_window")]
    pub snapshot_window: usize,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            tick_timeout_ms: default_tick_timeout_ms(),
            snapshot_window: default_snapshot_window(),
        }
    }
}

/// One agent in the fixed roster.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RosterEntry {
    /// The agent's id, used in commands, feedback, and model output.
    pub id: String,

    /// The agent's display name.
    #[serde(default)]
    pub name: String,
}

/// Which HTTP backend shape to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// A llama.cpp-style raw `/completion` endpoint.
    Completion,
    /// An OpenAI-compatible `/chat/completions` endpoint.
    OpenAi,
}

/// Inference provider settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InferenceConfig {
    /// Backend shape.
    #[serde(default = "default_backend")]
    pub backend: BackendKind,

    /// Base URL of the model server.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// API key, where the backend needs one (empty = unauthenticated).
    #[serde(default)]
    pub api_key: String,

    /// Model name passed to backends that route by model.
    #[serde(default = "default_model")]
    pub model: String,

    /// Deadline for one decision's inference call, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Retry budget for transient provider failures (timeouts are never
    /// retried).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Directory holding `system.j2`/`tick.j2` template overrides.
    /// `None` uses the compiled-in defaults.
    #[serde(default)]
    pub templates_dir: Option<String>,
}

impl InferenceConfig {
    /// Override endpoint settings from the environment when set.
    ///
    /// `VIVARIUM_API_URL` replaces `api_url`; `VIVARIUM_API_KEY` replaces
    /// `api_key`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("VIVARIUM_API_URL") {
            self.api_url = value;
        }
        if let Ok(value) = std::env::var("VIVARIUM_API_KEY") {
            self.api_key = value;
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            api_url: default_api_url(),
            api_key: String::new(),
            model: default_model(),
            request_timeout_ms: default_request_timeout_ms(),
            max_retries: default_max_retries(),
            templates_dir: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_world_name() -> String {
    "Vivarium Alpha".to_owned()
}

const fn default_seed() -> u64 {
    42
}

const fn default_tick_interval_ms() -> u64 {
    1_000
}

const fn default_max_real_time_seconds() -> u64 {
    86_400
}

const fn default_tick_timeout_ms() -> u64 {
    8_000
}

const fn default_snapshot_window() -> usize {
    24
}

fn default_roster() -> Vec<RosterEntry> {
    vec![
        RosterEntry {
            id: "alice".to_owned(),
            name: "Alice".to_owned(),
        },
        RosterEntry {
            id: "bob".to_owned(),
            name: "Bob".to_owned(),
        },
        RosterEntry {
            id: "chiara".to_owned(),
            name: "Chiara".to_owned(),
        },
    ]
}

const fn default_backend() -> BackendKind {
    BackendKind::Completion
}

fn default_api_url() -> String {
    "http://127.0.0.1:8080".to_owned()
}

fn default_model() -> String {
    "local".to_owned()
}

const fn default_request_timeout_ms() -> u64 {
    20_000
}

const fn default_max_retries() -> u32 {
    2
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        // `Default` skips the serde path, so the roster default must be
        // applied by hand before validating.
        let config = SimulationConfig {
            roster: default_roster(),
            ..config
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.world.seed, 42);
        assert_eq!(config.coordination.snapshot_window, 24);
        assert!(config.simulation.halt_on_decision_failure);
    }

    #[test]
    fn parse_empty_yaml_uses_defaults() {
        let config = SimulationConfig::parse("{}").unwrap();
        assert_eq!(config.roster.len(), 3);
        assert_eq!(config.inference.backend, BackendKind::Completion);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
world:
  name: "Test World"
  seed: 123

simulation:
  tick_interval_ms: 0
  max_ticks: 50
  max_real_time_seconds: 600
  halt_on_decision_failure: false

coordination:
  tick_timeout_ms: 2500
  snapshot_window: 12

roster:
  - id: a1
    name: "First"
  - id: a2
    name: "Second"

needs:
  decay_per_tick: 7
  critical_threshold: 20

inference:
  backend: openai
  api_url: "http://model-server:9000/v1"
  api_key: "secret"
  model: "tiny-chat"
  request_timeout_ms: 4000
  max_retries: 1

logging:
  level: debug
"#;
        let config = SimulationConfig::parse(yaml).unwrap();
        assert_eq!(config.world.name, "Test World");
        assert_eq!(config.simulation.max_ticks, 50);
        assert!(!config.simulation.halt_on_decision_failure);
        assert_eq!(config.coordination.tick_timeout_ms, 2500);
        assert_eq!(config.roster.len(), 2);
        assert_eq!(config.needs.decay_per_tick, 7);
        assert_eq!(config.needs.critical_threshold, 20);
        // Unspecified needs fields keep their defaults.
        assert_eq!(config.needs.low_threshold, 40);
        assert_eq!(config.inference.backend, BackendKind::OpenAi);
        assert_eq!(config.inference.model, "tiny-chat");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = SimulationConfig::parse("world:\n  seed: 7\n").unwrap();
        assert_eq!(config.world.seed, 7);
        assert_eq!(config.coordination.tick_timeout_ms, 8_000);
    }

    #[test]
    fn empty_roster_is_rejected() {
        let result = SimulationConfig::parse("roster: []\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn duplicate_agent_ids_are_rejected() {
        let yaml = "roster:\n  - id: a1\n  - id: a1\n";
        let result = SimulationConfig::parse(yaml);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn zero_tick_timeout_is_rejected() {
        let yaml = "coordination:\n  tick_timeout_ms: 0\n";
        let result = SimulationConfig::parse(yaml);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let result = SimulationConfig::parse(": not yaml");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }
}

//! Commands issued by the decision engine to agents.
//!
//! Every live agent receives exactly one [`Command`] per tick. When the
//! decision engine cannot produce one (missing, malformed, or late model
//! output), the coordinator substitutes the safe default: [`Command::no_op`].
//!
//! The action vocabulary is the movement-goal set of the simulated world:
//! each non-idle action sends the agent to the zone that restores one of its
//! needs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::AgentId;

/// Version tag of the decision output schema the engine asks models to emit.
pub const COMMAND_SCHEMA_VERSION: &str = "v1";

/// The action directed at a single agent for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandAction {
    /// Do nothing this tick. The safe default.
    Idle,
    /// Head home (restores energy).
    GoHome,
    /// Head to the office (restores work).
    GoWork,
    /// Head to the cafe (restores hunger).
    GoCafe,
    /// Head to the park (restores social).
    GoPark,
}

impl CommandAction {
    /// Every action in the vocabulary, in a stable order.
    pub const ALL: [Self; 5] = [
        Self::Idle,
        Self::GoHome,
        Self::GoWork,
        Self::GoCafe,
        Self::GoPark,
    ];

    /// The snake_case wire name of this action.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::GoHome => "go_home",
            Self::GoWork => "go_work",
            Self::GoCafe => "go_cafe",
            Self::GoPark => "go_park",
        }
    }

    /// Whether this action has no behavioral effect.
    pub const fn is_no_op(self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Parse an action name leniently (case-insensitive, surrounding
    /// whitespace ignored), for model outputs that do not match the wire
    /// format exactly.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "idle" | "no_op" | "noop" | "none" => Some(Self::Idle),
            "go_home" | "gohome" | "home" => Some(Self::GoHome),
            "go_work" | "gowork" | "work" => Some(Self::GoWork),
            "go_cafe" | "gocafe" | "cafe" => Some(Self::GoCafe),
            "go_park" | "gopark" | "park" => Some(Self::GoPark),
            _ => None,
        }
    }
}

impl core::fmt::Display for CommandAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A directive issued to a single agent for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// The agent this command is addressed to.
    pub target: AgentId,

    /// The action to perform.
    pub action: CommandAction,

    /// Free-form action parameters. Agents ignore keys they do not
    /// understand.
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
}

impl Command {
    /// Construct a command with no parameters.
    pub const fn new(target: AgentId, action: CommandAction) -> Self {
        Self {
            target,
            action,
            parameters: BTreeMap::new(),
        }
    }

    /// Construct the safe default command for `target`.
    pub const fn no_op(target: AgentId) -> Self {
        Self::new(target, CommandAction::Idle)
    }

    /// Whether this command has no behavioral effect.
    pub const fn is_no_op(&self) -> bool {
        self.action.is_no_op()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn action_wire_names_roundtrip() {
        for action in CommandAction::ALL {
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action.as_str()));
            let restored: CommandAction = serde_json::from_str(&json).unwrap();
            assert_eq!(restored, action);
        }
    }

    #[test]
    fn lenient_parse_accepts_variants() {
        assert_eq!(CommandAction::parse("go_cafe"), Some(CommandAction::GoCafe));
        assert_eq!(CommandAction::parse("GO_PARK"), Some(CommandAction::GoPark));
        assert_eq!(CommandAction::parse(" Idle "), Some(CommandAction::Idle));
        assert_eq!(CommandAction::parse("noop"), Some(CommandAction::Idle));
        assert_eq!(CommandAction::parse("home"), Some(CommandAction::GoHome));
        assert_eq!(CommandAction::parse("teleport"), None);
    }

    #[test]
    fn no_op_is_idle() {
        let command = Command::no_op(AgentId::new("alice"));
        assert!(command.is_no_op());
        assert_eq!(command.action, CommandAction::Idle);
        assert!(command.parameters.is_empty());
    }

    #[test]
    fn command_deserializes_without_parameters() {
        let json = r#"{"target": "bob", "action": "go_work"}"#;
        let command: Command = serde_json::from_str(json).unwrap();
        assert_eq!(command.target.as_str(), "bob");
        assert_eq!(command.action, CommandAction::GoWork);
        assert!(command.parameters.is_empty());
    }
}

//! Parsing of raw model output into per-agent commands.
//!
//! The inference provider returns raw text that is ideally a JSON object
//! keyed by agent id. In practice models wrap JSON in prose or markdown
//! fences, leave trailing commas, or answer with a bare action string per
//! agent. This module recovers what it can through layered strategies and
//! leaves the rest to the decision engine's no-op backfill -- a malformed
//! response degrades gracefully, it never crashes the loop.
//!
//! Expected shape (command schema `v1`):
//!
//! ```json
//! {"alice": {"action": "go_cafe"}, "bob": {"action": "idle"}}
//! ```
//!
//! Also accepted per agent: `{"goal": "..."}` (legacy key) and a bare
//! string `"go_cafe"`.

use std::collections::BTreeMap;

use serde::Deserialize;
use vivarium_types::commands::{Command, CommandAction};
use vivarium_types::ids::AgentId;

/// Error returned when no strategy recovers a JSON object from the output.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Every recovery strategy failed.
    #[error("no parseable command object in model output")]
    Unrecoverable,
}

/// One agent's entry in the raw decision object, before validation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawAgentCommand {
    /// The full form: `{"action": "...", "parameters": {...}}`.
    Full {
        /// The action name as the model wrote it.
        #[serde(alias = "goal")]
        action: String,
        /// Raw parameters, if any.
        #[serde(default)]
        parameters: serde_json::Value,
    },
    /// The shorthand form: just the action name.
    Bare(String),
}

impl RawAgentCommand {
    /// The action name as written by the model.
    pub fn action(&self) -> &str {
        match self {
            Self::Full { action, .. } => action,
            Self::Bare(action) => action,
        }
    }

    /// The raw parameters value, absent for the bare form.
    pub const fn parameters(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Full { parameters, .. } => Some(parameters),
            Self::Bare(_) => None,
        }
    }
}

/// The raw decision object: agent id -> unvalidated command.
pub type RawDecision = BTreeMap<String, RawAgentCommand>;

/// Parse raw model output into a [`RawDecision`] through layered recovery.
///
/// Strategies, in order: direct parse; markdown code-fence extraction;
/// trailing-comma stripping; brace-span extraction (first `{` to last `}`);
/// and combinations thereof.
///
/// # Errors
///
/// Returns [`ParseError::Unrecoverable`] when no strategy yields a JSON
/// object of the expected shape.
pub fn parse_raw_output(raw: &str) -> Result<RawDecision, ParseError> {
    let trimmed = raw.trim();

    let candidates = [
        Some(trimmed.to_owned()),
        extract_from_code_fence(trimmed).map(str::to_owned),
        Some(strip_trailing_commas(trimmed)),
        extract_from_code_fence(trimmed).map(strip_trailing_commas),
        extract_brace_span(trimmed).map(str::to_owned),
        extract_brace_span(trimmed).map(strip_trailing_commas),
    ];

    for candidate in candidates.into_iter().flatten() {
        if let Ok(decision) = serde_json::from_str::<RawDecision>(&candidate) {
            return Ok(decision);
        }
    }

    Err(ParseError::Unrecoverable)
}

/// Validate one raw entry into a typed [`Command`] for `agent_id`.
///
/// # Errors
///
/// Returns a human-readable description of what was wrong (unknown action
/// name); the caller records it as a decision gap and backfills a no-op.
pub fn to_command(agent_id: &AgentId, raw: &RawAgentCommand) -> Result<Command, String> {
    let action = CommandAction::parse(raw.action())
        .ok_or_else(|| format!("unknown action '{}'", raw.action()))?;

    let parameters = match raw.parameters() {
        Some(serde_json::Value::Object(fields)) => fields
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
        _ => BTreeMap::new(),
    };

    Ok(Command {
        target: agent_id.clone(),
        action,
        parameters,
    })
}

/// Extract the body of the first markdown code fence, if any.
fn extract_from_code_fence(text: &str) -> Option<&str> {
    let after_open = text.split_once("```")?.1;
    // Skip a language tag like `json` on the fence line.
    let body = after_open.split_once('\n').map_or(after_open, |(_, rest)| rest);
    let (inner, _) = body.split_once("```")?;
    Some(inner.trim())
}

/// Extract the span from the first `{` to the last `}`, if both exist.
fn extract_brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    text.get(start..=end)
}

/// Remove trailing commas before closing braces/brackets (a common model
/// output error that strict JSON parsers reject).
fn strip_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    // A comma plus any following whitespace, held until we know whether a
    // closing delimiter follows.
    let mut pending = String::new();
    for c in text.chars() {
        if pending.is_empty() {
            if c == ',' {
                pending.push(c);
            } else {
                out.push(c);
            }
        } else if c.is_whitespace() {
            pending.push(c);
        } else if c == '}' || c == ']' {
            out.extend(pending.chars().skip(1));
            out.push(c);
            pending.clear();
        } else {
            out.push_str(&pending);
            out.push(c);
            pending.clear();
        }
    }
    out.push_str(&pending);
    out
}

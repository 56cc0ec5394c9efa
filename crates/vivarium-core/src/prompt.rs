//! Prompt template rendering via `minijinja`.
//!
//! The decision engine owns the encoding of environment state into the
//! inference request. Templates can be loaded from a directory so operators
//! can tune model behavior without recompiling; compiled-in defaults keep
//! the engine runnable with no files on disk.
//!
//! Two templates exist: `system.j2` (the standing instructions) and
//! `tick.j2` (the per-tick state: roster, recent events, action vocabulary,
//! and the reply schema).

use minijinja::Environment;
use serde_json::json;
use vivarium_types::commands::{COMMAND_SCHEMA_VERSION, CommandAction};
use vivarium_types::ids::AgentId;
use vivarium_types::snapshot::EnvironmentSnapshot;

use crate::decision::InferenceRequest;

/// Default system template compiled into the crate.
const BUILTIN_SYSTEM: &str = include_str!("../templates/system.j2");

/// Default per-tick template compiled into the crate.
const BUILTIN_TICK: &str = include_str!("../templates/tick.j2");

/// Errors raised while loading or rendering prompt templates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromptError {
    /// A template file could not be read from disk.
    #[error("failed to read template {path}: {message}")]
    Io {
        /// The path that failed to load.
        path: String,
        /// The underlying I/O error text.
        message: String,
    },

    /// A template failed to compile or render.
    #[error("template error: {message}")]
    Template {
        /// The underlying template error text.
        message: String,
    },
}

/// Renders environment snapshots into inference requests.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    /// Create an engine using the compiled-in default templates.
    pub fn builtin() -> Result<Self, PromptError> {
        Self::from_templates(BUILTIN_SYSTEM.to_owned(), BUILTIN_TICK.to_owned())
    }

    /// Create an engine loading `system.j2` and `tick.j2` from `dir`.
    pub fn from_dir(dir: &str) -> Result<Self, PromptError> {
        let system = load_template(dir, "system.j2")?;
        let tick = load_template(dir, "tick.j2")?;
        Self::from_templates(system, tick)
    }

    /// Build the environment from already-loaded template sources.
    fn from_templates(system: String, tick: String) -> Result<Self, PromptError> {
        let mut env = Environment::new();
        env.add_template_owned("system", system)
            .map_err(|e| PromptError::Template {
                message: format!("failed to add system template: {e}"),
            })?;
        env.add_template_owned("tick", tick)
            .map_err(|e| PromptError::Template {
                message: format!("failed to add tick template: {e}"),
            })?;
        Ok(Self { env })
    }

    /// Render the full inference request for one tick's decision.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Template`] if rendering fails.
    pub fn render_decision_request(
        &self,
        snapshot: &EnvironmentSnapshot,
        roster: &[AgentId],
    ) -> Result<InferenceRequest, PromptError> {
        let context = build_context(snapshot, roster);

        let system = self
            .env
            .get_template("system")
            .map_err(|e| PromptError::Template {
                message: format!("missing system template: {e}"),
            })?
            .render(&context)
            .map_err(|e| PromptError::Template {
                message: format!("system render failed: {e}"),
            })?;

        let user = self
            .env
            .get_template("tick")
            .map_err(|e| PromptError::Template {
                message: format!("missing tick template: {e}"),
            })?
            .render(&context)
            .map_err(|e| PromptError::Template {
                message: format!("tick render failed: {e}"),
            })?;

        Ok(InferenceRequest { system, user })
    }
}

impl core::fmt::Debug for PromptEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PromptEngine").finish_non_exhaustive()
    }
}

/// Assemble the template context from the snapshot and roster.
fn build_context(snapshot: &EnvironmentSnapshot, roster: &[AgentId]) -> serde_json::Value {
    let events: Vec<serde_json::Value> = snapshot
        .events
        .iter()
        .map(|event| {
            // Payloads are pre-serialized so templates can splice them in
            // without caring about their structure.
            let payload = serde_json::to_string(&event.payload)
                .unwrap_or_else(|_| String::from("{}"));
            json!({
                "tick": event.tick,
                "source": event
                    .source_agent_id
                    .as_ref()
                    .map_or("environment", AgentId::as_str),
                "payload": payload,
            })
        })
        .collect();

    let roster: Vec<&str> = roster.iter().map(AgentId::as_str).collect();
    let actions: Vec<&str> = CommandAction::ALL.iter().map(|a| a.as_str()).collect();

    json!({
        "tick": snapshot.tick,
        "window": snapshot.window,
        "schema_version": COMMAND_SCHEMA_VERSION,
        "roster": roster,
        "actions": actions,
        "events": events,
    })
}

/// Read one template file from disk.
fn load_template(dir: &str, filename: &str) -> Result<String, PromptError> {
    let path = format!("{dir}/{filename}");
    std::fs::read_to_string(&path).map_err(|e| PromptError::Io {
        path,
        message: e.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use vivarium_types::events::{Event, Payload};

    use super::*;

    fn snapshot_with_feedback() -> EnvironmentSnapshot {
        let mut payload = Payload::new();
        payload.insert("status".to_owned(), json!("dying"));
        payload.insert("remedy".to_owned(), json!("go_cafe"));
        EnvironmentSnapshot {
            tick: 9,
            window: 16,
            events: vec![Event::feedback(8, AgentId::new("alice"), payload)],
        }
    }

    #[test]
    fn builtin_templates_render() {
        let engine = PromptEngine::builtin().unwrap();
        let roster = vec![AgentId::new("alice"), AgentId::new("bob")];

        let request = engine
            .render_decision_request(&snapshot_with_feedback(), &roster)
            .unwrap();

        assert!(request.system.contains("decision engine"));
        assert!(request.user.contains("Tick 9"));
        assert!(request.user.contains("alice, bob"));
        assert!(request.user.contains("go_cafe"));
        assert!(request.user.contains(COMMAND_SCHEMA_VERSION));
    }

    #[test]
    fn events_render_with_source_tag() {
        let engine = PromptEngine::builtin().unwrap();
        let roster = vec![AgentId::new("alice")];
        let mut payload = Payload::new();
        payload.insert("kind".to_owned(), json!("heatwave"));
        let snapshot = EnvironmentSnapshot {
            tick: 2,
            window: 4,
            events: vec![Event::environment(1, payload)],
        };

        let request = engine.render_decision_request(&snapshot, &roster).unwrap();
        assert!(request.user.contains("[environment]"));
        assert!(request.user.contains("heatwave"));
    }

    #[test]
    fn missing_directory_is_an_error() {
        let result = PromptEngine::from_dir("/nonexistent/vivarium-templates");
        assert!(matches!(result, Err(PromptError::Io { .. })));
    }

    #[test]
    fn directory_templates_override_builtins() {
        let unique = format!(
            "vivarium_test_templates_{}_{:?}",
            std::process::id(),
            std::thread::current().id(),
        );
        let dir = std::env::temp_dir().join(unique);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("system.j2"), "OVERRIDDEN SYSTEM").unwrap();
        std::fs::write(dir.join("tick.j2"), "tick {{ tick }} roster {{ roster | join(\",\") }}").unwrap();

        let engine = PromptEngine::from_dir(dir.to_str().unwrap()).unwrap();
        let roster = vec![AgentId::new("alice")];
        let request = engine
            .render_decision_request(&snapshot_with_feedback(), &roster)
            .unwrap();

        assert_eq!(request.system, "OVERRIDDEN SYSTEM");
        assert!(request.user.contains("tick 9"));

        std::fs::remove_dir_all(&dir).ok();
    }
}

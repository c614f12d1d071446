//! Prompt template rendering.

use minijinja::{Environment, UndefinedBehavior};
use mscan_core::error::{Result, ScanError};
use serde::Serialize;

/// Renders node prompt templates with `minijinja`.
///
/// In strict mode a variable missing from the context is an error instead of
/// silently rendering as an empty string.
pub struct PromptRenderer {
    env: Environment<'static>,
}

impl PromptRenderer {
    pub fn new(strict: bool) -> Self {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        if strict {
            env.set_undefined_behavior(UndefinedBehavior::Strict);
        }
        Self { env }
    }

    /// Renders `template` against `context`.
    pub fn render<S: Serialize>(&self, node_id: &str, template: &str, context: S) -> Result<String> {
        if template.trim().is_empty() {
            return Err(ScanError::template(format!(
                "Prompt template for node '{node_id}' is empty"
            )));
        }

        self.env
            .render_str(template, context)
            .map_err(|e| ScanError::template(format!("Node '{node_id}': {e}")))
    }
}

impl Default for PromptRenderer {
    fn default() -> Self {
        Self::new(true)
    }
}

//! Workflow configuration use case: node listing, updates and prompt versions.

use std::sync::Arc;

use mscan_core::error::{Result, ScanError};
use mscan_core::workflow::{NodeUpdate, PromptRepository, PromptVersion, WorkflowNode};

pub struct WorkflowUseCase {
    prompts: Arc<dyn PromptRepository>,
}

impl WorkflowUseCase {
    pub fn new(prompts: Arc<dyn PromptRepository>) -> Self {
        Self { prompts }
    }

    /// All nodes in configuration order.
    pub async fn list_nodes(&self) -> Result<Vec<WorkflowNode>> {
        self.prompts.list_nodes().await
    }

    /// Applies the prompt template first (as a saved version when requested),
    /// then the enabled flag.
    pub async fn update_node(&self, node_id: &str, update: NodeUpdate) -> Result<WorkflowNode> {
        if update.is_empty() {
            return Err(ScanError::validation("No data provided"));
        }
        self.prompts.find_node(node_id).await?;

        if let Some(template) = update.prompt_template.as_deref() {
            let template = require_template(Some(template))?;
            if update.save_version {
                self.prompts
                    .save_version(node_id, template, update.version_name.as_deref())
                    .await?;
            } else {
                self.prompts.update_prompt(node_id, template).await?;
            }
        }

        if let Some(enabled) = update.enabled {
            self.prompts.set_enabled(node_id, enabled).await?;
        }

        self.prompts.find_node(node_id).await
    }

    pub async fn toggle_node(&self, node_id: &str, enabled: Option<bool>) -> Result<WorkflowNode> {
        let enabled = enabled.ok_or_else(|| ScanError::validation("Enabled status is required"))?;
        self.prompts.set_enabled(node_id, enabled).await
    }

    pub async fn list_versions(&self, node_id: &str) -> Result<Vec<PromptVersion>> {
        self.prompts.list_versions(node_id).await
    }

    pub async fn save_version(
        &self,
        node_id: &str,
        prompt_template: Option<&str>,
        version_name: Option<&str>,
    ) -> Result<PromptVersion> {
        let template = require_template(prompt_template)?;
        self.prompts
            .save_version(node_id, template, version_name)
            .await
    }

    pub async fn get_version(&self, node_id: &str, version_id: &str) -> Result<PromptVersion> {
        self.prompts.get_version(node_id, version_id).await
    }

    pub async fn activate_version(&self, node_id: &str, version_id: &str) -> Result<PromptVersion> {
        self.prompts.activate_version(node_id, version_id).await
    }
}

fn require_template(template: Option<&str>) -> Result<&str> {
    match template {
        Some(t) if !t.trim().is_empty() => Ok(t),
        _ => Err(ScanError::validation("Prompt template is required")),
    }
}

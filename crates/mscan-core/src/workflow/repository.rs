//! Prompt repository trait.
//!
//! Defines the interface for workflow node configuration and prompt version
//! history.

use async_trait::async_trait;

use super::model::{PromptVersion, WorkflowNode};
use crate::error::Result;

/// An abstract repository for workflow node configuration.
///
/// Unknown node ids are reported as `ScanError::NotFound` with entity type
/// `"Node"`; unknown version ids as `"Version"`.
#[async_trait]
pub trait PromptRepository: Send + Sync {
    /// All nodes in pipeline order.
    async fn list_nodes(&self) -> Result<Vec<WorkflowNode>>;

    /// A single node.
    async fn find_node(&self, node_id: &str) -> Result<WorkflowNode>;

    /// Replaces the prompt template of a node and persists the change.
    async fn update_prompt(&self, node_id: &str, prompt_template: &str) -> Result<WorkflowNode>;

    /// Enables or disables a node and persists the change.
    async fn set_enabled(&self, node_id: &str, enabled: bool) -> Result<WorkflowNode>;

    /// Saves a new version of a node's template and makes it the active one.
    async fn save_version(
        &self,
        node_id: &str,
        prompt_template: &str,
        version_name: Option<&str>,
    ) -> Result<PromptVersion>;

    /// Version history of a node, newest first.
    async fn list_versions(&self, node_id: &str) -> Result<Vec<PromptVersion>>;

    /// A single saved version.
    async fn get_version(&self, node_id: &str, version_id: &str) -> Result<PromptVersion>;

    /// Makes a saved version the active template.
    async fn activate_version(&self, node_id: &str, version_id: &str) -> Result<PromptVersion>;
}

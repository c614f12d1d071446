//! Workflow node configuration model.

use serde::{Deserialize, Serialize};

/// How a node obtains its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Search-grounded question about the company.
    GoogleSearch,
    /// Question answered from the uploaded document.
    PdfAnalysis,
    /// Consolidates the other nodes' output into the final report.
    ReportWriter,
}

/// Configuration record of one pipeline step, as exposed over the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub description: String,
    pub prompt_template: String,
    pub enabled: bool,
}

/// A saved snapshot of a node's prompt template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptVersion {
    pub version_id: String,
    pub version_name: String,
    pub prompt_template: String,
    /// RFC 3339 timestamp.
    pub created_at: String,
    pub node_id: String,
    pub node_name: String,
}

/// Partial update of a node, as accepted by `PUT /api/workflow/nodes/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeUpdate {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub prompt_template: Option<String>,
    /// Store the new template as a named version instead of a plain overwrite.
    #[serde(default)]
    pub save_version: bool,
    #[serde(default)]
    pub version_name: Option<String>,
}

impl NodeUpdate {
    /// True when the update carries nothing to apply.
    pub fn is_empty(&self) -> bool {
        self.enabled.is_none() && self.prompt_template.is_none()
    }
}

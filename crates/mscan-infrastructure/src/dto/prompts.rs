//! On-disk representation of the prompts file.

use std::collections::HashSet;

use mscan_core::error::{Result, ScanError};
use mscan_core::workflow::{NodeKind, WorkflowNode};
use serde::{Deserialize, Serialize};

const DEFAULT_PROMPTS: &str = include_str!("../../defaults/prompts.toml");

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct PromptsFile {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub settings: PromptSettings,
    #[serde(rename = "node", default)]
    pub nodes: Vec<NodeDto>,
}

fn default_version() -> String {
    "1.0".to_string()
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct PromptSettings {
    /// Render templates with strict undefined-variable checking.
    #[serde(default = "default_true")]
    pub validate_variables: bool,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            validate_variables: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct NodeDto {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub prompt_template: String,
}

impl From<&NodeDto> for WorkflowNode {
    fn from(dto: &NodeDto) -> Self {
        WorkflowNode {
            id: dto.id.clone(),
            name: dto.name.clone(),
            kind: dto.kind,
            description: dto.description.clone(),
            prompt_template: dto.prompt_template.clone(),
            enabled: dto.enabled,
        }
    }
}

impl PromptsFile {
    /// The configuration shipped with the binary.
    pub fn builtin() -> Result<Self> {
        let file: PromptsFile = toml::from_str(DEFAULT_PROMPTS)?;
        file.validate()?;
        Ok(file)
    }

    /// Structural checks that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(ScanError::config("Prompts file defines no nodes"));
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if node.id.trim().is_empty() {
                return Err(ScanError::config("Node with empty id in prompts file"));
            }
            if !seen.insert(node.id.as_str()) {
                return Err(ScanError::config(format!(
                    "Node '{}' is defined more than once",
                    node.id
                )));
            }
        }
        Ok(())
    }

    pub fn node(&self, node_id: &str) -> Option<&NodeDto> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    /// Mutable access to a node, or `NotFound`.
    pub fn node_mut(&mut self, node_id: &str) -> Result<&mut NodeDto> {
        self.nodes
            .iter_mut()
            .find(|n| n.id == node_id)
            .ok_or_else(|| ScanError::not_found("Node", node_id))
    }
}

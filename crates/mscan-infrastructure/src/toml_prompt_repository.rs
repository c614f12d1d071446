//! TOML-backed `PromptRepository` with JSON version history.
//!
//! Directory structure:
//! ```text
//! prompts.toml
//! prompts_versions/
//! └── <node_id>/
//!     ├── 20250817_120000_000.json
//!     └── 20250818_093015_412.json
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{Local, Utc};
use mscan_core::error::{Result, ScanError};
use mscan_core::workflow::{PromptRepository, PromptVersion, WorkflowNode};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::RwLock;

use crate::dto::{NodeDto, PromptSettings, PromptsFile};
use crate::storage::{AtomicTomlError, AtomicTomlFile};

static VERSION_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("version id pattern is valid")
});

/// Prompt repository persisted to a single TOML file.
///
/// The parsed file is cached in memory; every mutation goes through
/// [`AtomicTomlFile::update`] and then refreshes the cache.
pub struct TomlPromptRepository {
    file: AtomicTomlFile<PromptsFile>,
    versions_dir: PathBuf,
    cache: RwLock<PromptsFile>,
}

impl TomlPromptRepository {
    /// Opens the prompts file, seeding it from the built-in defaults when it
    /// doesn't exist yet.
    pub fn open(prompts_path: impl Into<PathBuf>, versions_dir: impl Into<PathBuf>) -> Result<Self> {
        let file = AtomicTomlFile::<PromptsFile>::new(prompts_path.into());
        let data = match file.load()? {
            Some(data) => {
                data.validate()?;
                tracing::info!(
                    path = %file.path().display(),
                    version = %data.version,
                    nodes = data.nodes.len(),
                    "Loaded prompts configuration"
                );
                data
            }
            None => {
                let data = PromptsFile::builtin()?;
                file.save(&data)?;
                tracing::info!(
                    path = %file.path().display(),
                    "Seeded prompts configuration from built-in defaults"
                );
                data
            }
        };

        Ok(Self {
            file,
            versions_dir: versions_dir.into(),
            cache: RwLock::new(data),
        })
    }

    /// Rendering settings from the prompts file.
    pub async fn settings(&self) -> PromptSettings {
        self.cache.read().await.settings.clone()
    }

    async fn mutate_node<F>(&self, node_id: &str, f: F) -> Result<WorkflowNode>
    where
        F: FnOnce(&mut NodeDto),
    {
        let mut cache = self.cache.write().await;
        let (data, node) = self.file.update(cache.clone(), |data| {
            let node = data.node_mut(node_id)?;
            f(node);
            Ok::<_, AtomicTomlError>(WorkflowNode::from(&*node))
        })?;
        *cache = data;
        Ok(node)
    }

    fn node_versions_dir(&self, node_id: &str) -> PathBuf {
        self.versions_dir.join(node_id)
    }

    fn version_path(&self, node_id: &str, version_id: &str) -> PathBuf {
        self.node_versions_dir(node_id)
            .join(format!("{version_id}.json"))
    }

    async fn read_version(path: &Path) -> Result<PromptVersion> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[async_trait]
impl PromptRepository for TomlPromptRepository {
    async fn list_nodes(&self) -> Result<Vec<WorkflowNode>> {
        let cache = self.cache.read().await;
        Ok(cache.nodes.iter().map(WorkflowNode::from).collect())
    }

    async fn find_node(&self, node_id: &str) -> Result<WorkflowNode> {
        let cache = self.cache.read().await;
        cache
            .node(node_id)
            .map(WorkflowNode::from)
            .ok_or_else(|| ScanError::not_found("Node", node_id))
    }

    async fn update_prompt(&self, node_id: &str, prompt_template: &str) -> Result<WorkflowNode> {
        let node = self
            .mutate_node(node_id, |node| {
                node.prompt_template = prompt_template.to_string();
            })
            .await?;
        tracing::info!(node_id, "Updated prompt template");
        Ok(node)
    }

    async fn set_enabled(&self, node_id: &str, enabled: bool) -> Result<WorkflowNode> {
        let node = self
            .mutate_node(node_id, |node| node.enabled = enabled)
            .await?;
        tracing::info!(node_id, enabled, "Changed node enabled state");
        Ok(node)
    }

    async fn save_version(
        &self,
        node_id: &str,
        prompt_template: &str,
        version_name: Option<&str>,
    ) -> Result<PromptVersion> {
        let node = self.find_node(node_id).await?;

        let dir = self.node_versions_dir(node_id);
        tokio::fs::create_dir_all(&dir).await?;

        // Millisecond stamps can still collide under rapid saves.
        let stamp = Local::now().format("%Y%m%d_%H%M%S_%3f").to_string();
        let mut version_id = stamp.clone();
        let mut suffix = 1;
        while tokio::fs::try_exists(self.version_path(node_id, &version_id)).await? {
            version_id = format!("{stamp}_{suffix}");
            suffix += 1;
        }

        let version_name = version_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Version {version_id}"));

        let version = PromptVersion {
            version_id: version_id.clone(),
            version_name,
            prompt_template: prompt_template.to_string(),
            created_at: Utc::now().to_rfc3339(),
            node_id: node_id.to_string(),
            node_name: node.name,
        };

        let json = serde_json::to_string_pretty(&version)?;
        tokio::fs::write(self.version_path(node_id, &version_id), json).await?;

        self.update_prompt(node_id, prompt_template).await?;

        tracing::info!(node_id, version_id = %version.version_id, "Saved prompt version");
        Ok(version)
    }

    async fn list_versions(&self, node_id: &str) -> Result<Vec<PromptVersion>> {
        self.find_node(node_id).await?;

        let dir = self.node_versions_dir(node_id);
        if !tokio::fs::try_exists(&dir).await? {
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match Self::read_version(&path).await {
                Ok(version) => versions.push(version),
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Failed to load prompt version");
                }
            }
        }

        versions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(versions)
    }

    async fn get_version(&self, node_id: &str, version_id: &str) -> Result<PromptVersion> {
        self.find_node(node_id).await?;

        if !VERSION_ID.is_match(version_id) {
            return Err(ScanError::not_found("Version", version_id));
        }

        let path = self.version_path(node_id, version_id);
        if !tokio::fs::try_exists(&path).await? {
            return Err(ScanError::not_found("Version", version_id));
        }
        Self::read_version(&path).await
    }

    async fn activate_version(&self, node_id: &str, version_id: &str) -> Result<PromptVersion> {
        let version = self.get_version(node_id, version_id).await?;
        if version.prompt_template.trim().is_empty() {
            return Err(ScanError::validation(
                "Invalid version data: missing prompt_template",
            ));
        }

        self.update_prompt(node_id, &version.prompt_template).await?;
        tracing::info!(node_id, version_id, "Activated prompt version");
        Ok(version)
    }
}

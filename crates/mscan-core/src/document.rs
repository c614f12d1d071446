//! Uploaded source documents.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisId;
use crate::error::Result;

/// Reference to an uploaded document, usable by the workflow runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Where the stored bytes live.
    pub path: PathBuf,
    /// File name as supplied by the client.
    pub original_name: String,
}

impl DocumentRef {
    pub fn new(path: impl Into<PathBuf>, original_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            original_name: original_name.into(),
        }
    }
}

/// Storage for uploaded documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persists `bytes` for the given analysis and returns a reference to them.
    async fn store(&self, owner: &AnalysisId, file_name: &str, bytes: &[u8])
    -> Result<DocumentRef>;

    /// Loads the bytes behind a reference.
    async fn load(&self, document: &DocumentRef) -> Result<Vec<u8>>;
}

//! Writes finished reports to disk for later comparison.

use std::path::{Path, PathBuf};

use chrono::Local;
use mscan_core::error::{Result, ScanError};
use tokio::fs;

use crate::upload_storage::sanitize_file_name;

/// Archive of generated reports, one Markdown file per run.
#[derive(Debug, Clone)]
pub struct ReportArchive {
    dir: PathBuf,
}

impl ReportArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `report` as `<Company_Name>_<timestamp>.md` and returns the path.
    pub async fn archive(&self, company_name: &str, report: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).await.map_err(|e| {
            ScanError::io(format!(
                "Failed to create reports directory '{}': {}",
                self.dir.display(),
                e
            ))
        })?;

        let company = sanitize_file_name(&company_name.trim().replace(' ', "_"));
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = self.dir.join(format!("{company}_{timestamp}.md"));

        fs::write(&path, report).await?;
        tracing::info!(path = %path.display(), company = company_name, "Archived report");
        Ok(path)
    }
}

//! File system storage for uploaded documents.
//!
//! Files land in the uploads directory as `<analysis_id>_<sanitized name>`,
//! so two sessions uploading `report.pdf` never overwrite each other.

use std::path::PathBuf;

use async_trait::async_trait;
use mscan_core::analysis::AnalysisId;
use mscan_core::document::{DocumentRef, DocumentStore};
use mscan_core::error::{Result, ScanError};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::fs;

static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("sanitize pattern is valid"));

const MAX_NAME_LEN: usize = 120;

/// Infers the MIME type from a filename extension.
pub fn infer_mime_type(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .to_string()
}

/// Reduces a client supplied file name to a safe single path component.
///
/// Directory parts are dropped, runs of unsafe characters collapse to `_`
/// and leading dots are stripped so the result is never hidden or relative.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned = UNSAFE_CHARS.replace_all(base, "_");
    let cleaned = cleaned.trim_start_matches('.');

    let mut result: String = cleaned.chars().take(MAX_NAME_LEN).collect();
    if result.is_empty() {
        result = "upload.pdf".to_string();
    }
    result
}

/// Stores uploads under a single directory.
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    /// Creates the store, making sure the directory exists.
    pub async fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root).await.map_err(|e| {
            ScanError::io(format!(
                "Failed to create uploads directory '{}': {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn store(&self, owner: &AnalysisId, file_name: &str, bytes: &[u8]) -> Result<DocumentRef> {
        let mime_type = infer_mime_type(file_name);
        if mime_type != "application/pdf" {
            return Err(ScanError::validation("Only PDF files are supported"));
        }

        let stored_name = format!("{}_{}", owner, sanitize_file_name(file_name));
        let path = self.root.join(stored_name);

        fs::write(&path, bytes).await.map_err(|e| {
            ScanError::io(format!(
                "Failed to write upload '{}': {}",
                path.display(),
                e
            ))
        })?;

        tracing::info!(
            analysis_id = %owner,
            path = %path.display(),
            size = bytes.len(),
            mime_type = %mime_type,
            "Stored uploaded document"
        );

        Ok(DocumentRef::new(path, file_name))
    }

    async fn load(&self, document: &DocumentRef) -> Result<Vec<u8>> {
        fs::read(&document.path).await.map_err(|e| {
            ScanError::io(format!(
                "Failed to read document '{}': {}",
                document.path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_strips_directories_and_symbols() {
        assert_eq!(sanitize_file_name("../../etc/passwd.pdf"), "passwd.pdf");
        assert_eq!(sanitize_file_name("C:\\docs\\Annual Report.pdf"), "Annual_Report.pdf");
        assert_eq!(sanitize_file_name("..hidden.pdf"), "hidden.pdf");
        assert_eq!(sanitize_file_name("///"), "upload.pdf");
    }

    #[test]
    fn test_infer_mime_type() {
        assert_eq!(infer_mime_type("a.pdf"), "application/pdf");
        assert_eq!(infer_mime_type("A.PDF"), "application/pdf");
        assert_eq!(infer_mime_type("noext"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_store_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsDocumentStore::new(temp_dir.path().join("uploads"))
            .await
            .unwrap();
        let id = AnalysisId::from("abc");

        let doc = store.store(&id, "report.pdf", b"%PDF-1.4").await.unwrap();
        assert_eq!(doc.original_name, "report.pdf");
        assert!(doc.path.ends_with("abc_report.pdf"));
        assert_eq!(store.load(&doc).await.unwrap(), b"%PDF-1.4");
    }

    #[tokio::test]
    async fn test_same_name_different_sessions_do_not_collide() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsDocumentStore::new(temp_dir.path().to_path_buf())
            .await
            .unwrap();

        let a = store
            .store(&AnalysisId::from("a"), "report.pdf", b"one")
            .await
            .unwrap();
        let b = store
            .store(&AnalysisId::from("b"), "report.pdf", b"two")
            .await
            .unwrap();

        assert_ne!(a.path, b.path);
        assert_eq!(store.load(&a).await.unwrap(), b"one");
    }

    #[tokio::test]
    async fn test_rejects_non_pdf() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsDocumentStore::new(temp_dir.path().to_path_buf())
            .await
            .unwrap();

        let err = store
            .store(&AnalysisId::from("a"), "notes.txt", b"hi")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Only PDF files are supported");
    }
}

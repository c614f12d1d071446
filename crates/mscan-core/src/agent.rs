//! LLM backend abstraction used by the workflow runner.
//!
//! The runner needs three kinds of calls: a search-grounded question, a
//! question about an attached document, and plain text generation for the
//! report consolidation step. Adapters live in `mscan-interaction`.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by an LLM backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    /// The request reached the provider (or failed in transport) and was rejected.
    #[error("{message}")]
    ProcessError {
        status_code: Option<u16>,
        message: String,
        is_retryable: bool,
        retry_after: Option<Duration>,
    },

    /// The request could not be built or the answer was unusable.
    #[error("{0}")]
    ExecutionFailed(String),

    #[error("{0}")]
    Other(String),
}

impl AgentError {
    pub fn process_error_with_retry_after(
        status_code: u16,
        message: impl Into<String>,
        is_retryable: bool,
        retry_after: Duration,
    ) -> Self {
        Self::ProcessError {
            status_code: Some(status_code),
            message: message.into(),
            is_retryable,
            retry_after: Some(retry_after),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProcessError {
                is_retryable: true,
                ..
            }
        )
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::ProcessError { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<AgentError> for crate::error::ScanError {
    fn from(err: AgentError) -> Self {
        Self::Agent(err.to_string())
    }
}

/// A binary attachment sent alongside a prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentPayload {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl DocumentPayload {
    pub fn pdf(bytes: Vec<u8>) -> Self {
        Self {
            mime_type: "application/pdf".to_string(),
            bytes,
        }
    }
}

/// Knobs for a single text generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub max_output_tokens: u32,
    pub temperature: f32,
}

/// The research backend the workflow runner talks to.
#[async_trait]
pub trait ResearchAgent: Send + Sync {
    /// Answers `prompt` using web search grounding.
    async fn search(&self, prompt: &str) -> Result<String, AgentError>;

    /// Answers `prompt` about the attached document.
    async fn analyze_document(
        &self,
        prompt: &str,
        document: &DocumentPayload,
    ) -> Result<String, AgentError>;

    /// Plain text generation, used for report consolidation.
    async fn generate(&self, prompt: &str, options: GenerationOptions)
    -> Result<String, AgentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_detection() {
        let err = AgentError::process_error_with_retry_after(
            429,
            "RESOURCE_EXHAUSTED: quota",
            true,
            Duration::from_secs(3),
        );
        assert!(err.is_retryable());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));

        let err = AgentError::ExecutionFailed("no text".into());
        assert!(!err.is_retryable());
        assert_eq!(err.retry_after(), None);
    }
}

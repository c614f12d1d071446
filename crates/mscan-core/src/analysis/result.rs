//! Client-facing view of a session and the fetcher used by pollers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::model::{AnalysisId, AnalysisSession, SessionState};
use crate::error::Result;

/// What the Result API reports for a session.
///
/// `NotComplete` carries no payload at all, so an unfinished session can
/// never leak a partial report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AnalysisResultView {
    NotComplete,
    Completed {
        company_name: String,
        report: String,
        errors: Vec<String>,
    },
    Failed {
        company_name: String,
        errors: Vec<String>,
    },
}

impl AnalysisResultView {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::NotComplete)
    }
}

impl From<&AnalysisSession> for AnalysisResultView {
    fn from(session: &AnalysisSession) -> Self {
        match &session.state {
            SessionState::Uploading | SessionState::Processing => Self::NotComplete,
            SessionState::Completed { result } => Self::Completed {
                company_name: session.company_name.clone(),
                report: result.report.clone(),
                errors: session.errors.clone(),
            },
            SessionState::Failed => Self::Failed {
                company_name: session.company_name.clone(),
                errors: session.errors.clone(),
            },
        }
    }
}

/// Source of result views for the client poller.
///
/// An unknown id is reported as `ScanError::NotFound`; any other error is
/// treated by callers as a transient transport failure.
#[async_trait]
pub trait ResultFetcher: Send + Sync {
    async fn fetch(&self, id: &AnalysisId) -> Result<AnalysisResultView>;
}

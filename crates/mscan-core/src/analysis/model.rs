//! Analysis session domain model.
//!
//! A session tracks one analysis request from creation to its terminal
//! outcome. The result is carried inside [`SessionState::Completed`], so a
//! session can never be observed as completed without a report attached.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::DocumentRef;

/// Opaque identifier of an analysis session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisId(String);

impl AnalysisId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AnalysisId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for AnalysisId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for AnalysisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Externally visible status of an analysis session.
///
/// Progression is strictly forward:
/// `Uploading -> Processing -> {Completed | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// The request was accepted and the document stored; the runner has not started.
    Uploading,
    /// The workflow runner is executing.
    Processing,
    /// The runner finished and a report is attached.
    Completed,
    /// The runner gave up; see the session errors.
    Failed,
}

impl AnalysisStatus {
    /// Position in the lifecycle; terminal states share the last rank.
    fn rank(self) -> u8 {
        match self {
            Self::Uploading => 0,
            Self::Processing => 1,
            Self::Completed | Self::Failed => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether moving from `self` to `next` respects the forward-only lifecycle.
    pub fn can_transition_to(self, next: AnalysisStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Uploading => "uploading",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Outcome of a single pipeline node within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Completed,
    Failed,
    Skipped,
}

/// The structured result attached to a completed session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Final consolidated report (Markdown).
    pub report: String,
    /// Raw text produced by each node that completed, keyed by node id.
    pub node_outputs: BTreeMap<String, String>,
    /// Per-node processing status, keyed by node id.
    pub processing_status: BTreeMap<String, NodeStatus>,
}

/// Lifecycle state of a session, with the report bound to `Completed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionState {
    Uploading,
    Processing,
    Completed { result: AnalysisReport },
    Failed,
}

impl SessionState {
    pub fn status(&self) -> AnalysisStatus {
        match self {
            Self::Uploading => AnalysisStatus::Uploading,
            Self::Processing => AnalysisStatus::Processing,
            Self::Completed { .. } => AnalysisStatus::Completed,
            Self::Failed => AnalysisStatus::Failed,
        }
    }
}

/// Server-side record of one analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSession {
    pub id: AnalysisId,
    pub company_name: String,
    pub document: DocumentRef,
    pub state: SessionState,
    /// Errors accumulated while processing, in the order they occurred.
    /// May be non-empty on a completed session when some nodes failed.
    pub errors: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnalysisSession {
    /// Creates a session in the `Uploading` state.
    pub fn new(id: AnalysisId, company_name: impl Into<String>, document: DocumentRef) -> Self {
        let now = Utc::now();
        Self {
            id,
            company_name: company_name.into(),
            document,
            state: SessionState::Uploading,
            errors: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> AnalysisStatus {
        self.state.status()
    }

    /// The report, present if and only if the session is completed.
    pub fn result(&self) -> Option<&AnalysisReport> {
        match &self.state {
            SessionState::Completed { result } => Some(result),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session() -> AnalysisSession {
        AnalysisSession::new(
            AnalysisId::from("a-1"),
            "Acme Corp",
            DocumentRef::new("/tmp/a-1_acme.pdf", "acme.pdf"),
        )
    }

    #[test]
    fn test_forward_transitions_allowed() {
        use AnalysisStatus::*;
        assert!(Uploading.can_transition_to(Processing));
        assert!(Uploading.can_transition_to(Failed));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
    }

    #[test]
    fn test_backward_and_terminal_transitions_rejected() {
        use AnalysisStatus::*;
        assert!(!Processing.can_transition_to(Uploading));
        assert!(!Processing.can_transition_to(Processing));
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Completed));
    }

    #[test]
    fn test_new_session_has_no_result() {
        let session = sample_session();
        assert_eq!(session.status(), AnalysisStatus::Uploading);
        assert!(session.result().is_none());
        assert!(session.errors.is_empty());
    }

    #[test]
    fn test_result_present_only_when_completed() {
        let mut session = sample_session();
        session.state = SessionState::Processing;
        assert!(session.result().is_none());

        session.state = SessionState::Completed {
            result: AnalysisReport {
                report: "# Report".to_string(),
                node_outputs: BTreeMap::new(),
                processing_status: BTreeMap::new(),
            },
        };
        assert_eq!(session.status(), AnalysisStatus::Completed);
        assert_eq!(session.result().map(|r| r.report.as_str()), Some("# Report"));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = AnalysisId::generate();
        let b = AnalysisId::generate();
        assert_ne!(a, b);
    }
}

//! Session store trait.

use async_trait::async_trait;

use super::model::{AnalysisId, AnalysisReport, AnalysisSession, AnalysisStatus};
use crate::document::DocumentRef;
use crate::error::Result;

/// Authoritative holder of analysis sessions.
///
/// The Analysis API creates sessions, the workflow runner is the only writer
/// afterwards, and the Result API reads. Implementations must make
/// `complete` and `fail` atomic with respect to concurrent `get` calls: a
/// reader sees either the previous state or the terminal state with its
/// payload, never a mix.
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Inserts a new `Uploading` session under a freshly generated id.
    async fn create(&self, company_name: &str, document: DocumentRef) -> Result<AnalysisId>;

    /// Inserts a session built by the caller. Fails if the id is already taken.
    async fn insert(&self, session: AnalysisSession) -> Result<()>;

    /// Returns a snapshot of the session, or `NotFound`.
    async fn get(&self, id: &AnalysisId) -> Result<AnalysisSession>;

    /// Advances a non-terminal status. Backward or out-of-terminal moves are
    /// rejected with `InvalidTransition`.
    async fn set_status(&self, id: &AnalysisId, status: AnalysisStatus) -> Result<()>;

    /// Marks the session completed and attaches the report and any
    /// non-fatal errors in one step.
    async fn complete(
        &self,
        id: &AnalysisId,
        result: AnalysisReport,
        errors: Vec<String>,
    ) -> Result<()>;

    /// Marks the session failed and appends the given errors.
    async fn fail(&self, id: &AnalysisId, errors: Vec<String>) -> Result<()>;

    /// Number of sessions held.
    async fn len(&self) -> usize;
}

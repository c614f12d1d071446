use std::sync::Arc;

use mscan_application::{AnalysisUseCase, WorkflowUseCase};

/// Application state shared across request handlers.
pub struct AppState {
    pub analysis: Arc<AnalysisUseCase>,
    pub workflow: Arc<WorkflowUseCase>,
    /// Upper bound for a multipart `/api/analyze` body.
    pub max_upload_bytes: u64,
}

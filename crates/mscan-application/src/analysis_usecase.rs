//! Analysis use case: validation, session creation, background runs and
//! result lookup.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use mscan_core::analysis::{
    AnalysisId, AnalysisResultView, AnalysisSession, AnalysisStatus, AnalysisStore,
};
use mscan_core::document::{DocumentRef, DocumentStore};
use mscan_core::error::{Result, ScanError};
use tokio::sync::oneshot;

use crate::session::RunRegistry;
use crate::workflow_runner::{WorkflowOutcome, WorkflowRunner};

pub const CANCELLED_MESSAGE: &str = "Analysis cancelled";

/// A file part received with an analysis request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Raw input of `POST /api/analyze`, before validation.
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    pub company_name: Option<String>,
    pub file: Option<UploadedFile>,
}

pub struct AnalysisUseCase {
    store: Arc<dyn AnalysisStore>,
    documents: Arc<dyn DocumentStore>,
    runner: Arc<dyn WorkflowRunner>,
    runs: RunRegistry,
    max_duration: Duration,
}

impl AnalysisUseCase {
    pub fn new(
        store: Arc<dyn AnalysisStore>,
        documents: Arc<dyn DocumentStore>,
        runner: Arc<dyn WorkflowRunner>,
        max_duration: Duration,
    ) -> Self {
        Self {
            store,
            documents,
            runner,
            runs: RunRegistry::new(),
            max_duration,
        }
    }

    /// Validates the request, creates the session and starts the runner.
    ///
    /// Returns as soon as the run is scheduled; the run itself continues in
    /// the background.
    pub async fn start_analysis(&self, request: AnalysisRequest) -> Result<AnalysisId> {
        let company_name = validate_company_name(request.company_name.as_deref())?;
        let file = validate_file(request.file)?;

        let id = AnalysisId::generate();
        let document = self
            .documents
            .store(&id, &file.file_name, &file.bytes)
            .await?;
        self.store
            .insert(AnalysisSession::new(
                id.clone(),
                company_name.clone(),
                document.clone(),
            ))
            .await?;

        tracing::info!(analysis_id = %id, company = %company_name, "Analysis accepted");
        self.spawn_run(id.clone(), company_name, document).await;
        Ok(id)
    }

    async fn spawn_run(&self, id: AnalysisId, company_name: String, document: DocumentRef) {
        let store = self.store.clone();
        let runner = self.runner.clone();
        let runs = self.runs.clone();
        let max_duration = self.max_duration;
        let task_id = id.clone();

        // The task waits until its handle is registered, so it can never
        // deregister itself before registration.
        let (registered_tx, registered_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _ = registered_rx.await;
            execute_run(store, runner, &task_id, &company_name, &document, max_duration).await;
            runs.remove(&task_id).await;
        });

        self.runs.register(id, handle.abort_handle()).await;
        let _ = registered_tx.send(());
    }

    /// Current client-facing view of a session.
    pub async fn get_result(&self, id: &AnalysisId) -> Result<AnalysisResultView> {
        let session = self.store.get(id).await?;
        Ok(AnalysisResultView::from(&session))
    }

    /// Per-node outputs; empty until the session completes.
    pub async fn node_outputs(&self, id: &AnalysisId) -> Result<BTreeMap<String, String>> {
        let session = self.store.get(id).await?;
        Ok(session
            .result()
            .map(|result| result.node_outputs.clone())
            .unwrap_or_default())
    }

    pub async fn session(&self, id: &AnalysisId) -> Result<AnalysisSession> {
        self.store.get(id).await
    }

    /// Aborts a running analysis and fails its session.
    ///
    /// Returns `false` when the session had already reached a terminal state.
    pub async fn cancel(&self, id: &AnalysisId) -> Result<bool> {
        let session = self.store.get(id).await?;
        if session.status().is_terminal() {
            return Ok(false);
        }

        self.runs.abort(id).await;
        match self
            .store
            .fail(id, vec![CANCELLED_MESSAGE.to_string()])
            .await
        {
            Ok(()) => {
                tracing::info!(analysis_id = %id, "Analysis cancelled");
                Ok(true)
            }
            // The run finished between the status check and the abort.
            Err(e) if e.is_invalid_transition() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Cancels every in-flight run. Returns how many were stopped.
    pub async fn shutdown(&self) -> usize {
        let ids = self.runs.abort_all().await;
        let mut cancelled = 0;
        for id in &ids {
            match self.store.fail(id, vec![CANCELLED_MESSAGE.to_string()]).await {
                Ok(()) => cancelled += 1,
                Err(e) if e.is_invalid_transition() => {}
                Err(e) => tracing::warn!(analysis_id = %id, error = %e, "Failed to cancel run"),
            }
        }
        if cancelled > 0 {
            tracing::info!(cancelled, "Cancelled in-flight analyses");
        }
        cancelled
    }

    pub async fn active_runs(&self) -> usize {
        self.runs.len().await
    }
}

async fn execute_run(
    store: Arc<dyn AnalysisStore>,
    runner: Arc<dyn WorkflowRunner>,
    id: &AnalysisId,
    company_name: &str,
    document: &DocumentRef,
    max_duration: Duration,
) {
    if let Err(e) = store.set_status(id, AnalysisStatus::Processing).await {
        tracing::warn!(analysis_id = %id, error = %e, "Run not started");
        return;
    }

    let outcome = tokio::time::timeout(max_duration, runner.run(id, company_name, document)).await;

    let recorded = match outcome {
        Ok(WorkflowOutcome::Completed { result, errors }) => {
            store.complete(id, result, errors).await
        }
        Ok(WorkflowOutcome::Failed { errors }) => {
            tracing::warn!(analysis_id = %id, errors = ?errors, "Analysis failed");
            store.fail(id, errors).await
        }
        Err(_) => {
            tracing::error!(
                analysis_id = %id,
                max_duration_secs = max_duration.as_secs(),
                "Analysis timed out"
            );
            store
                .fail(
                    id,
                    vec![format!(
                        "Analysis timed out after {} seconds",
                        max_duration.as_secs()
                    )],
                )
                .await
        }
    };

    match recorded {
        Ok(()) => tracing::info!(analysis_id = %id, "Analysis finished"),
        Err(e) => tracing::warn!(analysis_id = %id, error = %e, "Could not record analysis outcome"),
    }
}

fn validate_company_name(company_name: Option<&str>) -> Result<String> {
    match company_name.map(str::trim) {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(ScanError::validation("Company name is required")),
    }
}

fn validate_file(file: Option<UploadedFile>) -> Result<UploadedFile> {
    let file = file.ok_or_else(|| ScanError::validation("PDF file is required"))?;
    if file.file_name.trim().is_empty() {
        return Err(ScanError::validation("No file selected"));
    }
    if !file.file_name.trim().to_lowercase().ends_with(".pdf") {
        return Err(ScanError::validation("Only PDF files are supported"));
    }
    Ok(file)
}

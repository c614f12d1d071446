//! HTTP client for a running mscan server.
//!
//! Implements [`ResultFetcher`] on top of `GET /api/result/{id}` and offers
//! the handful of calls the CLI needs.

use std::time::Duration;

use async_trait::async_trait;
use mscan_core::analysis::{AnalysisId, AnalysisResultView, ResultFetcher};
use mscan_core::error::{Result, ScanError};
use mscan_core::workflow::WorkflowNode;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct AnalyzeBody {
    success: bool,
    analysis_id: Option<String>,
    #[serde(default)]
    errors: Vec<String>,
}

#[derive(Deserialize)]
struct ResultBody {
    success: bool,
    company: Option<String>,
    report: Option<String>,
    #[serde(default)]
    errors: Vec<String>,
}

#[derive(Deserialize)]
struct NodeBody {
    node: WorkflowNode,
}

#[derive(Deserialize)]
struct CancelBody {
    cancelled: bool,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

#[derive(Clone)]
pub struct HttpResultClient {
    client: Client,
    base_url: String,
}

impl HttpResultClient {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:8000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Uses per-request timeouts for every call.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ScanError::internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(self)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Submits a new analysis and returns its id.
    pub async fn start_analysis(
        &self,
        company_name: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<AnalysisId> {
        let file = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")
            .map_err(transport)?;
        let form = Form::new()
            .text("company_name", company_name.to_string())
            .part("pdf_file", file);

        let response = self
            .client
            .post(self.url("/api/analyze"))
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let body: AnalyzeBody = response.json().await.map_err(transport)?;
        match (body.success, body.analysis_id) {
            (true, Some(id)) => Ok(AnalysisId::from(id)),
            _ if status == StatusCode::BAD_REQUEST => {
                Err(ScanError::validation(body.errors.join("; ")))
            }
            _ => Err(ScanError::execution(format_errors(status, &body.errors))),
        }
    }

    /// Lists workflow nodes in configuration order.
    pub async fn list_nodes(&self) -> Result<Vec<WorkflowNode>> {
        let response = self
            .client
            .get(self.url("/api/workflow/nodes"))
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        response.json().await.map_err(transport)
    }

    /// Enables or disables a node.
    pub async fn set_node_enabled(&self, node_id: &str, enabled: bool) -> Result<WorkflowNode> {
        let response = self
            .client
            .put(self.url(&format!("/api/workflow/nodes/{node_id}")))
            .json(&json!({ "enabled": enabled }))
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let body: NodeBody = response.json().await.map_err(transport)?;
        Ok(body.node)
    }

    /// Asks the server to stop a running analysis. Returns whether it was
    /// still running.
    pub async fn cancel_analysis(&self, id: &AnalysisId) -> Result<bool> {
        let response = self
            .client
            .post(self.url(&format!("/api/analyze/{id}/cancel")))
            .send()
            .await
            .map_err(transport)?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ScanError::not_found("Analysis", id.as_str())),
            status if status.is_success() => {
                let body: CancelBody = response.json().await.map_err(transport)?;
                Ok(body.cancelled)
            }
            _ => Err(error_from_response(response).await),
        }
    }
}

#[async_trait]
impl ResultFetcher for HttpResultClient {
    async fn fetch(&self, id: &AnalysisId) -> Result<AnalysisResultView> {
        let response = self
            .client
            .get(self.url(&format!("/api/result/{id}")))
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        match status {
            StatusCode::ACCEPTED => Ok(AnalysisResultView::NotComplete),
            StatusCode::NOT_FOUND => Err(ScanError::not_found("Analysis", id.as_str())),
            _ => {
                let body: ResultBody = response.json().await.map_err(transport)?;
                result_view(status, body)
            }
        }
    }
}

/// Maps a decoded result body; a body without `company` is not a session
/// outcome and counts as a transport failure.
fn result_view(status: StatusCode, body: ResultBody) -> Result<AnalysisResultView> {
    let Some(company_name) = body.company else {
        return Err(ScanError::io(format_errors(status, &body.errors)));
    };

    if body.success {
        Ok(AnalysisResultView::Completed {
            company_name,
            report: body.report.unwrap_or_default(),
            errors: body.errors,
        })
    } else {
        Ok(AnalysisResultView::Failed {
            company_name,
            errors: body.errors,
        })
    }
}

async fn error_from_response(response: reqwest::Response) -> ScanError {
    let status = response.status();
    let errors = response
        .json::<ErrorBody>()
        .await
        .map(|body| body.errors)
        .unwrap_or_default();
    let message = format_errors(status, &errors);

    if status == StatusCode::BAD_REQUEST {
        ScanError::validation(message)
    } else {
        ScanError::execution(message)
    }
}

fn format_errors(status: StatusCode, errors: &[String]) -> String {
    if errors.is_empty() {
        format!("Server responded with {status}")
    } else {
        errors.join("; ")
    }
}

fn transport(err: reqwest::Error) -> ScanError {
    ScanError::io(format!("Request failed: {err}"))
}

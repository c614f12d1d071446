//! The market scan workflow runner.
//!
//! Runs the enabled analysis steps concurrently, isolates their failures,
//! then consolidates the outputs into one report.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use mscan_core::agent::{AgentError, DocumentPayload, GenerationOptions, ResearchAgent};
use mscan_core::analysis::{AnalysisId, AnalysisReport, NodeStatus};
use mscan_core::config::{GeminiConfig, WorkflowConfig};
use mscan_core::document::{DocumentRef, DocumentStore};
use mscan_core::workflow::pipeline::{CORE_SECTIONS, REPORT_CONSOLIDATOR};
use mscan_core::workflow::{ANALYSIS_STEPS, PipelineStep, PromptRepository, WorkflowNode};
use mscan_infrastructure::ReportArchive;
use serde_json::{Map, Value, json};

use crate::prompt_renderer::PromptRenderer;
use crate::report::build_markdown_report;

pub const INSUFFICIENT_DATA: &str = "Insufficient data to generate comprehensive report";

/// Placeholder handed to the consolidator for sections without output.
const NOT_AVAILABLE: &str = "Not available";

/// Terminal result of one workflow run.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowOutcome {
    /// A report was produced; `errors` lists non-fatal node failures.
    Completed {
        result: AnalysisReport,
        errors: Vec<String>,
    },
    Failed { errors: Vec<String> },
}

/// Executes the analysis pipeline for one session.
#[async_trait]
pub trait WorkflowRunner: Send + Sync {
    async fn run(
        &self,
        analysis_id: &AnalysisId,
        company_name: &str,
        document: &DocumentRef,
    ) -> WorkflowOutcome;
}

#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Extra attempts for retryable agent errors.
    pub node_retries: u32,
    /// Linear backoff unit when the provider gives no `Retry-After`.
    pub retry_backoff: Duration,
    pub report_options: GenerationOptions,
}

impl RunnerSettings {
    pub fn from_config(workflow: &WorkflowConfig, gemini: &GeminiConfig) -> Self {
        Self {
            node_retries: workflow.node_retries,
            retry_backoff: workflow.retry_backoff(),
            report_options: GenerationOptions {
                max_output_tokens: gemini.report_max_output_tokens,
                temperature: gemini.temperature,
            },
        }
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self::from_config(&WorkflowConfig::default(), &GeminiConfig::default())
    }
}

struct StepResult {
    id: &'static str,
    status: NodeStatus,
    output: Option<String>,
    error: Option<String>,
}

impl StepResult {
    fn skipped(id: &'static str, error: Option<String>) -> Self {
        Self {
            id,
            status: NodeStatus::Skipped,
            output: None,
            error,
        }
    }

    fn failed(step: &PipelineStep, message: impl std::fmt::Display) -> Self {
        Self {
            id: step.id,
            status: NodeStatus::Failed,
            output: None,
            error: Some(format!("{} error: {}", step.error_label, message)),
        }
    }
}

/// The production runner: prompts from the repository, answers from the agent.
pub struct MarketScanWorkflow {
    agent: Arc<dyn ResearchAgent>,
    prompts: Arc<dyn PromptRepository>,
    documents: Arc<dyn DocumentStore>,
    renderer: PromptRenderer,
    archive: Option<ReportArchive>,
    settings: RunnerSettings,
}

impl MarketScanWorkflow {
    pub fn new(
        agent: Arc<dyn ResearchAgent>,
        prompts: Arc<dyn PromptRepository>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            agent,
            prompts,
            documents,
            renderer: PromptRenderer::default(),
            archive: None,
            settings: RunnerSettings::default(),
        }
    }

    pub fn with_renderer(mut self, renderer: PromptRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_archive(mut self, archive: ReportArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn with_settings(mut self, settings: RunnerSettings) -> Self {
        self.settings = settings;
        self
    }

    async fn load_document(
        &self,
        analysis_id: &AnalysisId,
        document: &DocumentRef,
        errors: &mut Vec<String>,
    ) -> Option<DocumentPayload> {
        match self.documents.load(document).await {
            Ok(bytes) if !bytes.is_empty() => Some(DocumentPayload::pdf(bytes)),
            Ok(_) => {
                tracing::warn!(analysis_id = %analysis_id, "Uploaded document is empty");
                errors.push("PDF processing error: document is empty".to_string());
                None
            }
            Err(e) => {
                tracing::error!(analysis_id = %analysis_id, error = %e, "Failed to load document");
                errors.push(format!("PDF processing error: {e}"));
                None
            }
        }
    }

    async fn run_step(
        &self,
        analysis_id: &AnalysisId,
        step: &'static PipelineStep,
        node: Option<&WorkflowNode>,
        company_name: &str,
        document: Option<&DocumentPayload>,
    ) -> StepResult {
        let Some(node) = node.filter(|n| n.enabled) else {
            tracing::info!(analysis_id = %analysis_id, node_id = step.id, "Node disabled, skipping");
            return StepResult::skipped(step.id, None);
        };

        if step.needs_document() && document.is_none() {
            tracing::warn!(analysis_id = %analysis_id, node_id = step.id, "No document, skipping");
            return StepResult::skipped(
                step.id,
                Some(format!("PDF not processed, skipping {} analysis", step.skip_label)),
            );
        }

        let rendered = match self.renderer.render(
            step.id,
            &node.prompt_template,
            json!({ "company_name": company_name }),
        ) {
            Ok(prompt) => prompt,
            Err(e) => return StepResult::failed(step, e),
        };

        tracing::info!(analysis_id = %analysis_id, node_id = step.id, "Running node");

        let prompt = rendered.as_str();
        let agent = self.agent.as_ref();
        let document = document.filter(|_| step.needs_document());
        let answer = self
            .with_retries(analysis_id, step.id, move || async move {
                match document {
                    Some(document) => agent.analyze_document(prompt, document).await,
                    None => agent.search(prompt).await,
                }
            })
            .await;

        match answer {
            Ok(text) if !text.trim().is_empty() => {
                tracing::info!(analysis_id = %analysis_id, node_id = step.id, "Node completed");
                StepResult {
                    id: step.id,
                    status: NodeStatus::Completed,
                    output: Some(text),
                    error: None,
                }
            }
            Ok(_) => StepResult::failed(step, "empty response"),
            Err(e) => {
                tracing::error!(analysis_id = %analysis_id, node_id = step.id, error = %e, "Node failed");
                StepResult::failed(step, e)
            }
        }
    }

    /// Calls `f`, retrying retryable agent errors with `Retry-After` or linear backoff.
    async fn with_retries<F, Fut>(
        &self,
        analysis_id: &AnalysisId,
        node_id: &str,
        f: F,
    ) -> Result<String, AgentError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<String, AgentError>>,
    {
        let mut attempt = 0;
        loop {
            match f().await {
                Err(e) if e.is_retryable() && attempt < self.settings.node_retries => {
                    attempt += 1;
                    let delay = e
                        .retry_after()
                        .unwrap_or(self.settings.retry_backoff * attempt);
                    tracing::warn!(
                        analysis_id = %analysis_id,
                        node_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying node after transient error"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    /// Asks the consolidator for the final report; `None` means fall back.
    async fn consolidate(
        &self,
        analysis_id: &AnalysisId,
        node: Option<&WorkflowNode>,
        company_name: &str,
        outputs: &BTreeMap<String, String>,
    ) -> (NodeStatus, Option<String>) {
        let Some(node) = node.filter(|n| n.enabled) else {
            return (NodeStatus::Skipped, None);
        };

        let mut context = Map::new();
        context.insert("company_name".to_string(), json!(company_name));
        for step in ANALYSIS_STEPS.iter() {
            let text = outputs
                .get(step.id)
                .cloned()
                .unwrap_or_else(|| NOT_AVAILABLE.to_string());
            context.insert(step.id.to_string(), Value::String(text));
        }

        let rendered = match self
            .renderer
            .render(REPORT_CONSOLIDATOR, &node.prompt_template, Value::Object(context))
        {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::error!(analysis_id = %analysis_id, error = %e, "Consolidator prompt failed to render");
                return (NodeStatus::Failed, None);
            }
        };

        let prompt = rendered.as_str();
        let agent = self.agent.as_ref();
        let options = self.settings.report_options;
        let result = self
            .with_retries(analysis_id, REPORT_CONSOLIDATOR, move || {
                agent.generate(prompt, options)
            })
            .await;

        match result {
            Ok(report) if !report.trim().is_empty() => (NodeStatus::Completed, Some(report)),
            Ok(_) => {
                tracing::warn!(analysis_id = %analysis_id, "Consolidator returned an empty report");
                (NodeStatus::Failed, None)
            }
            Err(e) => {
                tracing::error!(analysis_id = %analysis_id, error = %e, "Consolidator failed");
                (NodeStatus::Failed, None)
            }
        }
    }
}

#[async_trait]
impl WorkflowRunner for MarketScanWorkflow {
    async fn run(
        &self,
        analysis_id: &AnalysisId,
        company_name: &str,
        document: &DocumentRef,
    ) -> WorkflowOutcome {
        let nodes = match self.prompts.list_nodes().await {
            Ok(nodes) => nodes,
            Err(e) => {
                tracing::error!(analysis_id = %analysis_id, error = %e, "Failed to load workflow nodes");
                return WorkflowOutcome::Failed {
                    errors: vec![format!("Failed to load workflow configuration: {e}")],
                };
            }
        };
        let nodes: HashMap<&str, &WorkflowNode> =
            nodes.iter().map(|n| (n.id.as_str(), n)).collect();
        let is_enabled = |id: &str| nodes.get(id).is_some_and(|n| n.enabled);

        let mut errors = Vec::new();

        let wants_document = ANALYSIS_STEPS
            .iter()
            .any(|s| s.needs_document() && is_enabled(s.id));
        let payload = if wants_document {
            self.load_document(analysis_id, document, &mut errors).await
        } else {
            None
        };

        tracing::info!(analysis_id = %analysis_id, company = company_name, "Starting workflow");

        let results = join_all(ANALYSIS_STEPS.iter().map(|step| {
            self.run_step(
                analysis_id,
                step,
                nodes.get(step.id).copied(),
                company_name,
                payload.as_ref(),
            )
        }))
        .await;

        let mut node_outputs = BTreeMap::new();
        let mut processing_status = BTreeMap::new();
        for result in results {
            processing_status.insert(result.id.to_string(), result.status);
            if let Some(error) = result.error {
                errors.push(error);
            }
            if let Some(output) = result.output {
                node_outputs.insert(result.id.to_string(), output);
            }
        }

        if CORE_SECTIONS.iter().all(|id| !node_outputs.contains_key(*id)) {
            tracing::warn!(analysis_id = %analysis_id, "Insufficient data to generate report");
            errors.push(INSUFFICIENT_DATA.to_string());
            return WorkflowOutcome::Failed { errors };
        }

        let (consolidator_status, consolidated) = self
            .consolidate(
                analysis_id,
                nodes.get(REPORT_CONSOLIDATOR).copied(),
                company_name,
                &node_outputs,
            )
            .await;
        processing_status.insert(REPORT_CONSOLIDATOR.to_string(), consolidator_status);

        let report = match consolidated {
            Some(report) => report,
            None => {
                tracing::info!(analysis_id = %analysis_id, "Using concatenated Markdown report");
                build_markdown_report(company_name, &node_outputs)
            }
        };

        if let Some(archive) = &self.archive
            && let Err(e) = archive.archive(company_name, &report).await
        {
            tracing::warn!(analysis_id = %analysis_id, error = %e, "Failed to archive report");
        }

        tracing::info!(
            analysis_id = %analysis_id,
            completed = node_outputs.len(),
            errors = errors.len(),
            "Workflow finished"
        );

        WorkflowOutcome::Completed {
            result: AnalysisReport {
                report,
                node_outputs,
                processing_status,
            },
            errors,
        }
    }
}

//! Workflow runner tests against real prompt and document storage with a
//! scripted research agent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mscan_application::workflow_runner::INSUFFICIENT_DATA;
use mscan_application::{MarketScanWorkflow, RunnerSettings, WorkflowOutcome, WorkflowRunner};
use mscan_core::agent::{AgentError, DocumentPayload, GenerationOptions, ResearchAgent};
use mscan_core::analysis::{AnalysisId, NodeStatus};
use mscan_core::document::{DocumentRef, DocumentStore};
use mscan_core::workflow::PromptRepository;
use mscan_core::workflow::pipeline::REPORT_CONSOLIDATOR;
use mscan_infrastructure::{FsDocumentStore, ReportArchive, TomlPromptRepository};
use tempfile::TempDir;

const NODE_IDS: [&str; 8] = [
    "company_overview",
    "industry_overview",
    "promoters_directors",
    "credit_rating",
    "financials",
    "compliance_checks",
    "news_checks",
    REPORT_CONSOLIDATOR,
];

/// Answers `node:<id> ...` prompts with a canned section per node.
#[derive(Default)]
struct ScriptedAgent {
    failing: HashMap<String, AgentError>,
    /// Transient failures left before a node succeeds.
    flaky: Mutex<HashMap<String, u32>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedAgent {
    fn failing(mut self, node_id: &str, error: AgentError) -> Self {
        self.failing.insert(node_id.to_string(), error);
        self
    }

    fn flaky(self, node_id: &str, failures: u32) -> Self {
        self.flaky
            .lock()
            .unwrap()
            .insert(node_id.to_string(), failures);
        self
    }

    fn calls_for(&self, node_id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| *c == node_id)
            .count()
    }

    fn answer(&self, prompt: &str) -> Result<String, AgentError> {
        let node_id = prompt
            .split_whitespace()
            .next()
            .and_then(|w| w.strip_prefix("node:"))
            .unwrap_or("unknown")
            .to_string();
        self.calls.lock().unwrap().push(node_id.clone());

        if let Some(error) = self.failing.get(&node_id) {
            return Err(error.clone());
        }
        if let Some(left) = self.flaky.lock().unwrap().get_mut(&node_id)
            && *left > 0
        {
            *left -= 1;
            return Err(AgentError::ProcessError {
                status_code: Some(503),
                message: "UNAVAILABLE".to_string(),
                is_retryable: true,
                retry_after: None,
            });
        }
        Ok(format!("{node_id} findings"))
    }
}

#[async_trait]
impl ResearchAgent for ScriptedAgent {
    async fn search(&self, prompt: &str) -> Result<String, AgentError> {
        self.answer(prompt)
    }

    async fn analyze_document(
        &self,
        prompt: &str,
        document: &DocumentPayload,
    ) -> Result<String, AgentError> {
        assert_eq!(document.mime_type, "application/pdf");
        self.answer(prompt)
    }

    async fn generate(
        &self,
        prompt: &str,
        _options: GenerationOptions,
    ) -> Result<String, AgentError> {
        self.answer(prompt).map(|_| format!("CONSOLIDATED\n{prompt}"))
    }
}

struct Fixture {
    _temp_dir: TempDir,
    prompts: Arc<TomlPromptRepository>,
    documents: Arc<FsDocumentStore>,
    document: DocumentRef,
    reports_dir: std::path::PathBuf,
}

async fn fixture() -> Fixture {
    let temp_dir = TempDir::new().unwrap();
    let prompts = Arc::new(
        TomlPromptRepository::open(
            temp_dir.path().join("prompts.toml"),
            temp_dir.path().join("prompts_versions"),
        )
        .unwrap(),
    );
    for id in NODE_IDS {
        let template = if id == REPORT_CONSOLIDATOR {
            "node:report_consolidator {{ company_name }}\n{{ company_overview }}\n{{ financials }}"
                .to_string()
        } else {
            format!("node:{id} about {{{{ company_name }}}}")
        };
        prompts.update_prompt(id, &template).await.unwrap();
    }

    let documents = Arc::new(
        FsDocumentStore::new(temp_dir.path().join("uploads"))
            .await
            .unwrap(),
    );
    let document = documents
        .store(&AnalysisId::from("run-1"), "annual.pdf", b"%PDF-1.4 test")
        .await
        .unwrap();
    let reports_dir = temp_dir.path().join("reports");

    Fixture {
        _temp_dir: temp_dir,
        prompts,
        documents,
        document,
        reports_dir,
    }
}

fn fast_settings() -> RunnerSettings {
    RunnerSettings {
        retry_backoff: Duration::from_millis(1),
        ..RunnerSettings::default()
    }
}

fn workflow(fixture: &Fixture, agent: Arc<ScriptedAgent>) -> MarketScanWorkflow {
    MarketScanWorkflow::new(agent, fixture.prompts.clone(), fixture.documents.clone())
        .with_settings(fast_settings())
}

async fn run(workflow: &MarketScanWorkflow, fixture: &Fixture) -> WorkflowOutcome {
    workflow
        .run(&AnalysisId::from("run-1"), "Acme Corp", &fixture.document)
        .await
}

#[tokio::test]
async fn test_all_nodes_succeed_and_consolidator_writes_report() {
    let fixture = fixture().await;
    let agent = Arc::new(ScriptedAgent::default());
    let workflow = workflow(&fixture, agent.clone());

    let WorkflowOutcome::Completed { result, errors } = run(&workflow, &fixture).await else {
        panic!("expected a completed run");
    };

    assert!(errors.is_empty());
    assert_eq!(result.node_outputs.len(), 7);
    assert!(result.report.starts_with("CONSOLIDATED"));
    assert!(result.report.contains("company_overview findings"));
    assert!(result.report.contains("financials findings"));
    assert_eq!(
        result.processing_status.get(REPORT_CONSOLIDATOR),
        Some(&NodeStatus::Completed)
    );
    for id in NODE_IDS {
        assert_eq!(agent.calls_for(id), 1, "{id} should run once");
    }
}

#[tokio::test]
async fn test_failed_node_is_isolated() {
    let fixture = fixture().await;
    let agent = Arc::new(
        ScriptedAgent::default().failing("credit_rating", AgentError::Other("boom".to_string())),
    );
    let workflow = workflow(&fixture, agent);

    let WorkflowOutcome::Completed { result, errors } = run(&workflow, &fixture).await else {
        panic!("expected a completed run");
    };

    assert_eq!(errors, vec!["Credit rating error: boom".to_string()]);
    assert_eq!(result.node_outputs.len(), 6);
    assert_eq!(
        result.processing_status.get("credit_rating"),
        Some(&NodeStatus::Failed)
    );
    assert_eq!(
        result.processing_status.get("news_checks"),
        Some(&NodeStatus::Completed)
    );
}

#[tokio::test]
async fn test_disabled_node_is_skipped_without_error() {
    let fixture = fixture().await;
    fixture
        .prompts
        .set_enabled("news_checks", false)
        .await
        .unwrap();
    let agent = Arc::new(ScriptedAgent::default());
    let workflow = workflow(&fixture, agent.clone());

    let WorkflowOutcome::Completed { result, errors } = run(&workflow, &fixture).await else {
        panic!("expected a completed run");
    };

    assert!(errors.is_empty());
    assert_eq!(agent.calls_for("news_checks"), 0);
    assert!(!result.node_outputs.contains_key("news_checks"));
    assert_eq!(
        result.processing_status.get("news_checks"),
        Some(&NodeStatus::Skipped)
    );
}

#[tokio::test]
async fn test_missing_document_skips_document_nodes() {
    let fixture = fixture().await;
    let agent = Arc::new(ScriptedAgent::default());
    let workflow = workflow(&fixture, agent.clone());
    let missing = DocumentRef::new(fixture.documents.root().join("gone.pdf"), "gone.pdf");

    let WorkflowOutcome::Completed { result, errors } = workflow
        .run(&AnalysisId::from("run-1"), "Acme Corp", &missing)
        .await
    else {
        panic!("core search sections should still produce a report");
    };

    assert!(errors[0].starts_with("PDF processing error:"));
    assert!(errors.contains(&"PDF not processed, skipping directors analysis".to_string()));
    assert!(errors.contains(&"PDF not processed, skipping credit rating analysis".to_string()));
    assert!(errors.contains(&"PDF not processed, skipping financial analysis".to_string()));
    assert_eq!(agent.calls_for("financials"), 0);
    assert_eq!(
        result.processing_status.get("promoters_directors"),
        Some(&NodeStatus::Skipped)
    );
}

#[tokio::test]
async fn test_core_sections_missing_fails_the_run() {
    let fixture = fixture().await;
    let agent = Arc::new(
        ScriptedAgent::default()
            .failing("company_overview", AgentError::Other("down".to_string()))
            .failing("industry_overview", AgentError::Other("down".to_string()))
            .failing("promoters_directors", AgentError::Other("down".to_string())),
    );
    let workflow = workflow(&fixture, agent.clone());

    let WorkflowOutcome::Failed { errors } = run(&workflow, &fixture).await else {
        panic!("expected a failed run");
    };

    assert_eq!(errors.last().map(String::as_str), Some(INSUFFICIENT_DATA));
    assert_eq!(errors.len(), 4);
    assert_eq!(agent.calls_for(REPORT_CONSOLIDATOR), 0);
}

#[tokio::test]
async fn test_consolidator_failure_falls_back_to_markdown() {
    let fixture = fixture().await;
    let agent = Arc::new(
        ScriptedAgent::default().failing(REPORT_CONSOLIDATOR, AgentError::Other("quota".to_string())),
    );
    let workflow = workflow(&fixture, agent);

    let WorkflowOutcome::Completed { result, errors } = run(&workflow, &fixture).await else {
        panic!("expected a completed run");
    };

    assert!(errors.is_empty());
    assert!(result.report.starts_with("# Market Scan Report: Acme Corp"));
    assert!(result.report.contains("## 1. Company & Business Overview\n\ncompany_overview findings"));
    assert_eq!(
        result.processing_status.get(REPORT_CONSOLIDATOR),
        Some(&NodeStatus::Failed)
    );
}

#[tokio::test]
async fn test_disabled_consolidator_uses_markdown_report() {
    let fixture = fixture().await;
    fixture
        .prompts
        .set_enabled(REPORT_CONSOLIDATOR, false)
        .await
        .unwrap();
    let agent = Arc::new(ScriptedAgent::default());
    let workflow = workflow(&fixture, agent.clone());

    let WorkflowOutcome::Completed { result, .. } = run(&workflow, &fixture).await else {
        panic!("expected a completed run");
    };

    assert_eq!(agent.calls_for(REPORT_CONSOLIDATOR), 0);
    assert!(result.report.starts_with("# Market Scan Report: Acme Corp"));
    assert_eq!(
        result.processing_status.get(REPORT_CONSOLIDATOR),
        Some(&NodeStatus::Skipped)
    );
}

#[tokio::test]
async fn test_retryable_errors_are_retried() {
    let fixture = fixture().await;
    let agent = Arc::new(ScriptedAgent::default().flaky("news_checks", 2));
    let workflow = workflow(&fixture, agent.clone());

    let WorkflowOutcome::Completed { result, errors } = run(&workflow, &fixture).await else {
        panic!("expected a completed run");
    };

    assert!(errors.is_empty());
    assert_eq!(agent.calls_for("news_checks"), 3);
    assert_eq!(
        result.node_outputs.get("news_checks").map(String::as_str),
        Some("news_checks findings")
    );
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let fixture = fixture().await;
    let agent = Arc::new(ScriptedAgent::default().flaky("news_checks", 10));
    let workflow = workflow(&fixture, agent.clone());

    let WorkflowOutcome::Completed { errors, .. } = run(&workflow, &fixture).await else {
        panic!("expected a completed run");
    };

    assert_eq!(agent.calls_for("news_checks"), 3);
    assert_eq!(errors, vec!["News analysis error: UNAVAILABLE".to_string()]);
}

#[tokio::test]
async fn test_report_is_archived() {
    let fixture = fixture().await;
    let agent = Arc::new(ScriptedAgent::default());
    let workflow = workflow(&fixture, agent).with_archive(ReportArchive::new(&fixture.reports_dir));

    let WorkflowOutcome::Completed { result, .. } = run(&workflow, &fixture).await else {
        panic!("expected a completed run");
    };

    let entries: Vec<_> = std::fs::read_dir(&fixture.reports_dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(entries.len(), 1);
    let name = entries[0].file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("Acme_Corp_"));
    assert_eq!(std::fs::read_to_string(&entries[0]).unwrap(), result.report);
}

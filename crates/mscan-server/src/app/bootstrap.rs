use std::sync::Arc;

use anyhow::{Result, anyhow};
use mscan_application::{
    AnalysisUseCase, InMemoryAnalysisStore, MarketScanWorkflow, PromptRenderer, RunnerSettings,
    WorkflowUseCase,
};
use mscan_core::agent::ResearchAgent;
use mscan_core::config::AppConfig;
use mscan_infrastructure::{
    ConfigService, FsDocumentStore, ReportArchive, ScanPaths, TomlPromptRepository,
};
use mscan_interaction::GeminiResearchAgent;

use crate::app::AppState;

pub struct AppBootstrap {
    pub config: AppConfig,
    pub paths: ScanPaths,
    pub app_state: Arc<AppState>,
}

impl AppBootstrap {
    /// Wires the server against the Gemini backend.
    pub async fn initialize(config: AppConfig) -> Result<Self> {
        config.require_api_key()?;
        let agent = GeminiResearchAgent::from_config(&config.gemini)
            .map_err(|e| anyhow!("Failed to create Gemini client: {}", e))?;
        Self::with_agent(config, Arc::new(agent)).await
    }

    /// Wires the server against any research backend.
    ///
    /// Validates the configuration, opens the prompt store (seeding it on
    /// first run) and prepares the upload and report directories.
    pub async fn with_agent(mut config: AppConfig, agent: Arc<dyn ResearchAgent>) -> Result<Self> {
        for adjustment in config.validate()? {
            tracing::warn!("[Bootstrap] {}", adjustment);
        }

        let paths = ConfigService::paths(&config)?;
        tracing::info!("[Bootstrap] Data directory: {}", paths.root().display());

        let prompts = Arc::new(TomlPromptRepository::open(
            paths.prompts_file(),
            paths.versions_dir(),
        )?);
        let prompt_settings = prompts.settings().await;
        let documents = Arc::new(FsDocumentStore::new(paths.uploads_dir()).await?);

        let mut workflow = MarketScanWorkflow::new(agent, prompts.clone(), documents.clone())
            .with_renderer(PromptRenderer::new(prompt_settings.validate_variables))
            .with_settings(RunnerSettings::from_config(&config.workflow, &config.gemini));
        if config.workflow.archive_reports {
            workflow = workflow.with_archive(ReportArchive::new(paths.reports_dir()));
        }

        let analysis = Arc::new(AnalysisUseCase::new(
            Arc::new(InMemoryAnalysisStore::new()),
            documents,
            Arc::new(workflow),
            config.workflow.max_duration(),
        ));
        let workflow = Arc::new(WorkflowUseCase::new(prompts));

        let app_state = Arc::new(AppState {
            analysis,
            workflow,
            max_upload_bytes: config.server.max_upload_bytes,
        });

        Ok(Self {
            config,
            paths,
            app_state,
        })
    }
}

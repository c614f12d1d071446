//! `ResearchAgent` backed by Gemini.
//!
//! Search-backed nodes go through [`WebSearchAgent`] on the search model;
//! document analysis and report writing use [`GeminiApiAgent`] on the main
//! model.

use std::time::Duration;

use async_trait::async_trait;
use mscan_core::agent::{AgentError, DocumentPayload, GenerationOptions, ResearchAgent};
use mscan_core::config::GeminiConfig;
use reqwest::Client;

use crate::gemini_api_agent::GeminiApiAgent;
use crate::web_search::WebSearchAgent;

const SYSTEM_INSTRUCTION: &str = "You are a financial research analyst preparing due-diligence \
material. Answer factually, cite figures with their period, and say so plainly when information \
is not available instead of guessing.";

pub struct GeminiResearchAgent {
    analyst: GeminiApiAgent,
    search: WebSearchAgent,
    document_options: GenerationOptions,
}

impl GeminiResearchAgent {
    /// Builds both underlying agents from configuration.
    pub fn from_config(config: &GeminiConfig) -> Result<Self, AgentError> {
        if config.api_key.trim().is_empty() {
            return Err(AgentError::ExecutionFailed(
                "Gemini API key is not configured".into(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AgentError::ExecutionFailed(format!("Failed to build HTTP client: {e}")))?;

        let analyst = GeminiApiAgent::new(config.api_key.clone(), config.model.clone())
            .with_client(client.clone())
            .with_system_instruction(SYSTEM_INSTRUCTION);

        let search = WebSearchAgent::new(config.api_key.clone())
            .with_model(config.search_model.clone())
            .with_client(client)
            .with_temperature(config.search_temperature);

        tracing::info!(
            model = %config.model,
            search_model = %config.search_model,
            "Gemini research agent ready"
        );

        Ok(Self {
            analyst,
            search,
            document_options: GenerationOptions {
                max_output_tokens: config.max_output_tokens,
                temperature: config.temperature,
            },
        })
    }
}

#[async_trait]
impl ResearchAgent for GeminiResearchAgent {
    async fn search(&self, prompt: &str) -> Result<String, AgentError> {
        let response = self.search.search(prompt).await?;
        tracing::debug!(
            references = response.references.len(),
            "Search answered"
        );
        Ok(response.to_markdown())
    }

    async fn analyze_document(
        &self,
        prompt: &str,
        document: &DocumentPayload,
    ) -> Result<String, AgentError> {
        self.analyst
            .generate_with_document(prompt, document, self.document_options)
            .await
    }

    async fn generate(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<String, AgentError> {
        self.analyst.generate_text(prompt, options).await
    }
}

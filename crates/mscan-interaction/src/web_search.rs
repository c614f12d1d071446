//! Google Web Search agent that leverages Gemini's `google_search` tool.
//!
//! The agent sends `generateContent` requests with the google_search tool enabled
//! and extracts both the synthesized answer and grounded references, so the
//! report can cite its sources under each search-backed section.

use std::collections::HashSet;

use mscan_core::agent::AgentError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::gemini_api_agent::{
    API_KEY_HEADER, BASE_URL, GenerationConfig, map_http_error, parse_retry_after,
};

const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_TEMPERATURE: f32 = 0.2;
const DEFAULT_TOP_P: f32 = 0.8;
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4096;

/// Agent capable of calling Gemini with the google_search tool.
#[derive(Clone)]
pub struct WebSearchAgent {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    generation_config: GenerationConfig,
}

impl WebSearchAgent {
    /// Creates a new agent using the provided API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: BASE_URL.to_string(),
            generation_config: GenerationConfig {
                temperature: DEFAULT_TEMPERATURE,
                max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
                top_p: Some(DEFAULT_TOP_P),
            },
        }
    }

    /// Overrides the Gemini model name if needed.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.generation_config.temperature = temperature;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.generation_config.max_output_tokens = max_output_tokens;
        self
    }

    /// Runs a grounded query and returns the answer with its references.
    pub async fn search(&self, query: &str) -> Result<WebSearchResponse, AgentError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(AgentError::ExecutionFailed(
                "WebSearch query cannot be empty".into(),
            ));
        }

        let url = format!(
            "{}/{model}:generateContent",
            self.base_url,
            model = self.model
        );

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: trimmed.to_string(),
                }],
            }],
            tools: vec![Tool::default()],
            generation_config: self.generation_config,
        };

        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| AgentError::ProcessError {
                status_code: None,
                message: format!("Google Search request failed: {err}"),
                is_retryable: err.is_connect() || err.is_timeout(),
                retry_after: None,
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read Google Search error body".to_string());
            return Err(map_http_error(status, body, retry_after));
        }

        let payload: Value = response.json().await.map_err(|err| {
            AgentError::Other(format!("Failed to parse Google Search response: {err}"))
        })?;

        let answer = extract_answer(&payload).ok_or_else(|| {
            AgentError::ExecutionFailed("Google Search returned no answer".into())
        })?;
        let references = extract_references(&payload);

        Ok(WebSearchResponse {
            query: trimmed.to_string(),
            answer,
            references,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    tools: Vec<Tool>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize, Default)]
struct Tool {
    #[serde(rename = "google_search")]
    google_search: GoogleSearchConfig,
}

#[derive(Serialize, Default)]
struct GoogleSearchConfig {}

/// Structured reference returned by Gemini's grounding metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSearchReference {
    pub title: String,
    pub url: String,
}

/// Search response returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSearchResponse {
    pub query: String,
    pub answer: String,
    pub references: Vec<WebSearchReference>,
}

impl WebSearchResponse {
    /// The answer followed by a Markdown list of sources, if any.
    pub fn to_markdown(&self) -> String {
        if self.references.is_empty() {
            return self.answer.clone();
        }

        let sources = self
            .references
            .iter()
            .map(|r| format!("- [{}]({})", r.title, r.url))
            .collect::<Vec<_>>()
            .join("\n");
        format!("{}\n\n**Sources:**\n{}", self.answer, sources)
    }
}

fn extract_answer(root: &Value) -> Option<String> {
    let candidates = root.get("candidates")?.as_array()?;

    let mut collected = Vec::new();
    for candidate in candidates {
        if let Some(parts) = candidate
            .get("content")
            .and_then(|content| content.get("parts"))
            .and_then(|parts| parts.as_array())
        {
            for part in parts {
                if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        collected.push(trimmed.to_string());
                    }
                }
            }
        }
    }

    if collected.is_empty() {
        None
    } else {
        Some(collected.join("\n\n"))
    }
}

fn extract_references(root: &Value) -> Vec<WebSearchReference> {
    let mut seen = HashSet::new();
    let mut references = Vec::new();

    let Some(candidates) = root.get("candidates").and_then(|c| c.as_array()) else {
        return references;
    };

    for candidate in candidates {
        let Some(chunks) = candidate
            .get("groundingMetadata")
            .and_then(|metadata| metadata.get("groundingChunks"))
            .and_then(|chunks| chunks.as_array())
        else {
            continue;
        };

        for chunk in chunks {
            let Some(web) = chunk.get("web") else {
                continue;
            };
            let Some(url) = web.get("uri").and_then(|v| v.as_str()) else {
                continue;
            };
            if !seen.insert(url.to_string()) {
                continue;
            }

            let title = web
                .get("title")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| url.to_string());

            references.push(WebSearchReference {
                title,
                url: url.to_string(),
            });
        }
    }

    references
}

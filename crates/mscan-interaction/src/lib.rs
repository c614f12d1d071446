pub mod gemini_api_agent;
pub mod research_agent;
pub mod result_client;
pub mod web_search;

pub use gemini_api_agent::GeminiApiAgent;
pub use research_agent::GeminiResearchAgent;
pub use result_client::HttpResultClient;
pub use web_search::{WebSearchAgent, WebSearchResponse};

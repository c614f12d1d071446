//! Storage DTOs.

pub mod prompts;

pub use prompts::{NodeDto, PromptSettings, PromptsFile};

//! Workflow configuration domain module.
//!
//! - `model`: node records, prompt versions and node updates
//! - `pipeline`: the fixed seven-step topology
//! - `repository`: the `PromptRepository` trait

mod model;
pub mod pipeline;
pub mod repository;

pub use model::{NodeKind, NodeUpdate, PromptVersion, WorkflowNode};
pub use pipeline::{ANALYSIS_STEPS, PipelineStep};
pub use repository::PromptRepository;

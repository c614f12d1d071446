//! Application layer for mscan.
//!
//! Use cases that coordinate the domain model, storage adapters and the LLM
//! backend: analysis sessions, the workflow runner, workflow configuration
//! and the client-side result poller.

pub mod analysis_usecase;
pub mod poller;
pub mod prompt_renderer;
pub mod report;
pub mod session;
pub mod workflow_runner;
pub mod workflow_usecase;

pub use analysis_usecase::{AnalysisRequest, AnalysisUseCase, UploadedFile};
pub use poller::{PollSnapshot, PollState, PollerSettings, ResultPoller};
pub use prompt_renderer::PromptRenderer;
pub use session::InMemoryAnalysisStore;
pub use workflow_runner::{MarketScanWorkflow, RunnerSettings, WorkflowOutcome, WorkflowRunner};
pub use workflow_usecase::WorkflowUseCase;

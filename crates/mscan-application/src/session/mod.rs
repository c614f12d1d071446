//! Analysis session management.
//!
//! - `store`: in-memory `AnalysisStore`
//! - `tasks`: abort handles of in-flight workflow runs

mod store;
mod tasks;

pub use store::InMemoryAnalysisStore;
pub use tasks::RunRegistry;

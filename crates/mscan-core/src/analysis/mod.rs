//! Analysis session domain module.
//!
//! # Module Structure
//!
//! - `model`: session record, lifecycle status and report types
//! - `store`: the `AnalysisStore` trait implemented by the application layer
//! - `result`: the client-facing result view and the `ResultFetcher` trait

mod model;
pub mod result;
pub mod store;

pub use model::{
    AnalysisId, AnalysisReport, AnalysisSession, AnalysisStatus, NodeStatus, SessionState,
};
pub use result::{AnalysisResultView, ResultFetcher};
pub use store::AnalysisStore;

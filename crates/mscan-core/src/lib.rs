pub mod agent;
pub mod analysis;
pub mod config;
pub mod document;
pub mod error;
pub mod workflow;

// Re-export common error type
pub use error::ScanError;

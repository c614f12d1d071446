//! The mscan HTTP server.
//!
//! Exposed as a library so the route tree can be exercised in-process.

pub mod app;
pub mod logging;
pub mod routes;

pub use app::{AppBootstrap, AppState};

//! HTTP surface of the server.
//!
//! - `analysis`: submission, results, node outputs and cancellation
//! - `workflow`: node configuration and prompt versions
//! - `response`: envelopes and rejection mapping

mod analysis;
mod response;
mod workflow;

use std::convert::Infallible;
use std::sync::Arc;

use warp::{Filter, Rejection, Reply};

use crate::app::AppState;

pub use response::handle_rejection;

/// All routes with rejection recovery, CORS and request tracing applied.
///
/// Only rejected CORS preflights still surface as rejections.
pub fn api(state: Arc<AppState>) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "PUT"])
        .allow_headers(vec!["content-type"]);

    analysis::routes(state.clone())
        .or(workflow::routes(state))
        .unify()
        .recover(handle_rejection)
        .unify()
        .with(cors)
        .with(warp::trace::request())
}

fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

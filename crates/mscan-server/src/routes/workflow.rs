//! Workflow configuration endpoints.

use std::sync::Arc;

use bytes::Bytes;
use mscan_core::workflow::NodeUpdate;
use serde::Deserialize;
use serde_json::json;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection};

use super::response;
use super::with_state;
use crate::app::AppState;

#[derive(Debug, Default, Deserialize)]
struct ToggleBody {
    enabled: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct VersionBody {
    prompt_template: Option<String>,
    version_name: Option<String>,
}

pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let list_nodes = warp::path!("api" / "workflow" / "nodes")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(list_nodes);

    let update_node = warp::path!("api" / "workflow" / "nodes" / String)
        .and(warp::put())
        .and(warp::body::bytes())
        .and(with_state(state.clone()))
        .and_then(update_node);

    let toggle_node = warp::path!("api" / "workflow" / "nodes" / String / "toggle")
        .and(warp::put())
        .and(warp::body::bytes())
        .and(with_state(state.clone()))
        .and_then(toggle_node);

    let list_versions = warp::path!("api" / "workflow" / "nodes" / String / "versions")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(list_versions);

    let save_version = warp::path!("api" / "workflow" / "nodes" / String / "versions")
        .and(warp::post())
        .and(warp::body::bytes())
        .and(with_state(state.clone()))
        .and_then(save_version);

    let get_version = warp::path!("api" / "workflow" / "nodes" / String / "versions" / String)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(get_version);

    let activate_version =
        warp::path!("api" / "workflow" / "nodes" / String / "versions" / String / "activate")
            .and(warp::put())
            .and(with_state(state))
            .and_then(activate_version);

    list_nodes
        .or(update_node)
        .unify()
        .or(toggle_node)
        .unify()
        .or(list_versions)
        .unify()
        .or(save_version)
        .unify()
        .or(get_version)
        .unify()
        .or(activate_version)
        .unify()
}

async fn list_nodes(state: Arc<AppState>) -> Result<Response, Rejection> {
    Ok(match state.workflow.list_nodes().await {
        Ok(nodes) => response::ok(&nodes),
        Err(e) => response::error(&e),
    })
}

async fn update_node(
    node_id: String,
    body: Bytes,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    let update = match response::parse_body::<NodeUpdate>(&body) {
        Ok(update) => update,
        Err(e) => return Ok(response::error(&e)),
    };

    Ok(match state.workflow.update_node(&node_id, update).await {
        Ok(node) => response::ok(&json!({ "success": true, "node": node })),
        Err(e) => response::error(&e),
    })
}

async fn toggle_node(
    node_id: String,
    body: Bytes,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    let toggle = match response::parse_body::<ToggleBody>(&body) {
        Ok(toggle) => toggle,
        Err(e) => return Ok(response::error(&e)),
    };

    Ok(match state.workflow.toggle_node(&node_id, toggle.enabled).await {
        Ok(node) => {
            let action = if node.enabled { "enabled" } else { "disabled" };
            response::ok(&json!({
                "success": true,
                "node": node,
                "message": format!("Node {node_id} {action}"),
            }))
        }
        Err(e) => response::error(&e),
    })
}

async fn list_versions(node_id: String, state: Arc<AppState>) -> Result<Response, Rejection> {
    Ok(match state.workflow.list_versions(&node_id).await {
        Ok(versions) => response::ok(&json!({
            "success": true,
            "node_id": node_id,
            "versions": versions,
        })),
        Err(e) => response::error(&e),
    })
}

async fn save_version(
    node_id: String,
    body: Bytes,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    let body = match response::parse_body::<VersionBody>(&body) {
        Ok(body) => body,
        Err(e) => return Ok(response::error(&e)),
    };

    let saved = state
        .workflow
        .save_version(
            &node_id,
            body.prompt_template.as_deref(),
            body.version_name.as_deref(),
        )
        .await;
    Ok(match saved {
        Ok(version) => response::ok(&json!({ "success": true, "version": version })),
        Err(e) => response::error(&e),
    })
}

async fn get_version(
    node_id: String,
    version_id: String,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    Ok(match state.workflow.get_version(&node_id, &version_id).await {
        Ok(version) => response::ok(&json!({ "success": true, "version": version })),
        Err(e) => response::error(&e),
    })
}

async fn activate_version(
    node_id: String,
    version_id: String,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    Ok(
        match state.workflow.activate_version(&node_id, &version_id).await {
            Ok(version) => response::json(
                StatusCode::OK,
                &json!({
                    "success": true,
                    "version": version,
                    "message": format!("Version {version_id} set as active for node {node_id}"),
                }),
            ),
            Err(e) => response::error(&e),
        },
    )
}

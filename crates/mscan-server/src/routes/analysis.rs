//! Analysis endpoints: submission, result lookup, node outputs, cancellation.

use std::sync::Arc;

use bytes::BufMut;
use futures::TryStreamExt;
use mscan_application::{AnalysisRequest, UploadedFile};
use mscan_core::analysis::{AnalysisId, AnalysisResultView};
use serde_json::json;
use warp::http::StatusCode;
use warp::multipart::{FormData, Part};
use warp::reply::Response;
use warp::{Filter, Rejection};

use super::response;
use super::with_state;
use crate::app::AppState;

const COMPANY_FIELD: &str = "company_name";
const FILE_FIELD: &str = "pdf_file";

pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let analyze = warp::path!("api" / "analyze")
        .and(warp::post())
        .and(warp::multipart::form().max_length(state.max_upload_bytes))
        .and(with_state(state.clone()))
        .and_then(analyze);

    let result = warp::path!("api" / "result" / String)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(get_result);

    let node_outputs = warp::path!("api" / "workflow" / "node_outputs" / String)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(get_node_outputs);

    let cancel = warp::path!("api" / "analyze" / String / "cancel")
        .and(warp::post())
        .and(with_state(state))
        .and_then(cancel);

    analyze
        .or(result)
        .unify()
        .or(node_outputs)
        .unify()
        .or(cancel)
        .unify()
}

async fn analyze(form: FormData, state: Arc<AppState>) -> Result<Response, Rejection> {
    let request = match read_form(form).await {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "Unreadable multipart body");
            return Ok(response::failure(
                StatusCode::BAD_REQUEST,
                vec!["Invalid multipart form data".to_string()],
            ));
        }
    };
    let company = request
        .company_name
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    match state.analysis.start_analysis(request).await {
        Ok(id) => Ok(response::ok(&json!({
            "success": true,
            "company": company,
            "analysis_id": id,
            "message": "Analysis started successfully",
        }))),
        Err(e) => {
            if !e.is_validation() {
                tracing::error!(company = %company, error = %e, "Failed to start analysis");
            }
            Ok(response::json(
                response::status_of(&e),
                &json!({
                    "success": false,
                    "company": company,
                    "errors": [response::message_of(&e)],
                }),
            ))
        }
    }
}

/// Collects the known form fields; unknown parts are drained and ignored.
async fn read_form(form: FormData) -> Result<AnalysisRequest, warp::Error> {
    let mut request = AnalysisRequest::default();
    futures::pin_mut!(form);

    while let Some(part) = form.try_next().await? {
        match part.name() {
            COMPANY_FIELD => {
                let bytes = read_part(part).await?;
                request.company_name = Some(String::from_utf8_lossy(&bytes).into_owned());
            }
            FILE_FIELD => {
                let file_name = part.filename().unwrap_or_default().to_string();
                let bytes = read_part(part).await?;
                request.file = Some(UploadedFile { file_name, bytes });
            }
            _ => {
                read_part(part).await?;
            }
        }
    }

    Ok(request)
}

async fn read_part(part: Part) -> Result<Vec<u8>, warp::Error> {
    part.stream()
        .try_fold(Vec::new(), |mut bytes, chunk| async move {
            bytes.put(chunk);
            Ok(bytes)
        })
        .await
}

async fn get_result(id: String, state: Arc<AppState>) -> Result<Response, Rejection> {
    let id = AnalysisId::from(id);
    let reply = match state.analysis.get_result(&id).await {
        Ok(AnalysisResultView::NotComplete) => response::json(
            StatusCode::ACCEPTED,
            &json!({
                "success": false,
                "errors": ["Analysis is not yet complete"],
            }),
        ),
        Ok(AnalysisResultView::Completed {
            company_name,
            report,
            errors,
        }) => response::ok(&json!({
            "success": true,
            "company": company_name,
            "report": report,
            "errors": errors,
        })),
        Ok(AnalysisResultView::Failed {
            company_name,
            errors,
        }) => response::json(
            StatusCode::INTERNAL_SERVER_ERROR,
            &json!({
                "success": false,
                "company": company_name,
                "errors": errors,
            }),
        ),
        Err(e) => response::error(&e),
    };
    Ok(reply)
}

async fn get_node_outputs(id: String, state: Arc<AppState>) -> Result<Response, Rejection> {
    let id = AnalysisId::from(id);
    Ok(match state.analysis.node_outputs(&id).await {
        Ok(outputs) => response::ok(&outputs),
        Err(e) => response::error(&e),
    })
}

async fn cancel(id: String, state: Arc<AppState>) -> Result<Response, Rejection> {
    let id = AnalysisId::from(id);
    Ok(match state.analysis.cancel(&id).await {
        Ok(cancelled) => {
            let message = if cancelled {
                "Analysis cancelled"
            } else {
                "Analysis already finished"
            };
            response::ok(&json!({
                "success": true,
                "cancelled": cancelled,
                "message": message,
            }))
        }
        Err(e) => response::error(&e),
    })
}

//! Response envelopes and rejection handling.
//!
//! Every failure leaves the server as `{success: false, errors: [...]}`.

use std::convert::Infallible;

use mscan_core::error::ScanError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use warp::http::StatusCode;
use warp::reply::{self, Reply, Response};
use warp::{Rejection, reject};

pub fn json<T: Serialize>(status: StatusCode, body: &T) -> Response {
    reply::with_status(reply::json(body), status).into_response()
}

pub fn ok<T: Serialize>(body: &T) -> Response {
    json(StatusCode::OK, body)
}

/// Status code for a domain error.
pub fn status_of(error: &ScanError) -> StatusCode {
    match error {
        ScanError::Validation(_) => StatusCode::BAD_REQUEST,
        ScanError::NotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Client-facing text for a domain error.
pub fn message_of(error: &ScanError) -> String {
    match error {
        ScanError::NotFound { entity_type, id } => match *entity_type {
            "Analysis" => "Analysis ID not found".to_string(),
            entity => format!("{entity} {id} not found"),
        },
        other => other.to_string(),
    }
}

pub fn failure(status: StatusCode, errors: Vec<String>) -> Response {
    json(status, &json!({ "success": false, "errors": errors }))
}

pub fn error(error: &ScanError) -> Response {
    let status = status_of(error);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %error, "Request failed");
    }
    failure(status, vec![message_of(error)])
}

/// Parses an optional JSON body; an empty body yields `T::default()`.
pub fn parse_body<T>(body: &[u8]) -> Result<T, ScanError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ScanError::validation(format!("Invalid JSON body: {e}")))
}

/// Converts warp rejections into the error envelope.
pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed".to_string(),
        )
    } else if err.find::<reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            "Uploaded file is too large".to_string(),
        )
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Invalid request body: {e}"))
    } else if err.find::<reject::UnsupportedMediaType>().is_some()
        || err.find::<reject::InvalidHeader>().is_some()
        || err.find::<reject::MissingHeader>().is_some()
        || err.find::<reject::LengthRequired>().is_some()
    {
        (
            StatusCode::BAD_REQUEST,
            "Malformed request".to_string(),
        )
    } else {
        tracing::error!(rejection = ?err, "Unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    };

    Ok(failure(status, vec![message]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mscan_core::workflow::NodeUpdate;

    #[test]
    fn test_not_found_messages_per_entity() {
        assert_eq!(
            message_of(&ScanError::not_found("Analysis", "x")),
            "Analysis ID not found"
        );
        assert_eq!(
            message_of(&ScanError::not_found("Node", "news")),
            "Node news not found"
        );
        assert_eq!(
            message_of(&ScanError::not_found("Version", "v1")),
            "Version v1 not found"
        );
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(&ScanError::validation("bad")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(&ScanError::not_found("Node", "x")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(&ScanError::internal("boom")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_parse_body() {
        let update: NodeUpdate = parse_body(b"").unwrap();
        assert!(update.is_empty());

        let update: NodeUpdate = parse_body(br#"{"enabled": false}"#).unwrap();
        assert_eq!(update.enabled, Some(false));

        let err = parse_body::<NodeUpdate>(b"{not json").unwrap_err();
        assert!(err.is_validation());
    }
}

use super::FlowRequest;
use crate::error::FlowError;
use crate::urls::with_query;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Custom failure response, called with the failing request and its error.
pub type FailureHandler = Arc<dyn Fn(&FlowRequest, &FlowError) -> Response + Send + Sync>;

/// 302 to `{prefix}/failure?message=...&state=...`.
pub(super) fn default_failure(failure_path: &str, req: &FlowRequest, err: &FlowError) -> Response {
    let message = err.to_string();
    let mut pairs = vec![("message", message.as_str())];
    if let Some(state) = req.param("state") {
        pairs.push(("state", state));
    }
    let location = with_query(failure_path, &pairs);

    // Form-encoding leaves nothing a header value rejects.
    match HeaderValue::from_str(&location) {
        Ok(location) => (
            StatusCode::FOUND,
            [
                (header::LOCATION, location),
                (header::CONTENT_TYPE, HeaderValue::from_static("text/html")),
            ],
        )
            .into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "authentication failed").into_response(),
    }
}

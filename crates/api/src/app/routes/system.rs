use axum::http::StatusCode;

use crate::app::errors;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Only reachable once the gateway let the call through, which it never does
/// for paths missing from the access policy.
pub async fn unknown_method() -> axum::response::Response {
    errors::json_error(StatusCode::NOT_FOUND, "unimplemented", "unknown method")
}

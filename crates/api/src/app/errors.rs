use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;

use kinship_auth::GatewayError;
use kinship_core::{DomainError, ErrorKind};
use kinship_membership::SyncError;

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn gateway_error(err: &GatewayError) -> Response {
    let kind = err.kind();
    json_error(status_for(kind), kind.as_str(), err.to_string())
}

pub fn domain_error(op: &'static str, err: DomainError) -> Response {
    let kind = err.kind();
    if kind == ErrorKind::Internal {
        tracing::error!(op, error = %err, "request failed");
    } else {
        tracing::info!(op, error = %err, "request refused");
    }
    json_error(status_for(kind), kind.as_str(), err.public_message())
}

/// Success body, or the partial-success shape when some directory sync
/// failed after the change was committed.
pub fn respond<T: Serialize>(body: T, sync_error: Option<SyncError>) -> Response {
    match sync_error {
        None => (StatusCode::OK, axum::Json(body)).into_response(),
        Some(err) => {
            let kind = err.kind();
            (
                status_for(kind),
                axum::Json(json!({
                    "error": kind.as_str(),
                    "message": err.to_string(),
                    "data": body,
                })),
            )
                .into_response()
        }
    }
}

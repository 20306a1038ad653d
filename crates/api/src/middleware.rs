use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

use kinship_auth::AuthGateway;

use crate::app::errors;

#[derive(Clone)]
pub struct GatewayState {
    pub gateway: AuthGateway,
}

/// Admission for every RPC route (and the fallback).
///
/// The request path is the method identifier. On success the `Principal` is
/// inserted as a request extension; on failure the handler never runs.
pub async fn gateway_middleware(State(state): State<GatewayState>, mut req: Request, next: Next) -> Response {
    let method = req.uri().path().to_string();
    let authorization = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let principal = match state.gateway.admit(&method, authorization) {
        Ok(principal) => principal,
        Err(e) => {
            tracing::warn!(%method, error = %e, "call rejected by gateway");
            return errors::gateway_error(&e);
        }
    };

    let span = tracing::info_span!(
        "rpc",
        call_id = %Uuid::now_v7(),
        %method,
        user_id = %principal.user_id,
    );
    req.extensions_mut().insert(principal);
    next.run(req).instrument(span).await
}

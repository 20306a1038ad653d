//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: adapter selection and service construction
//! - `routes/`: one file per RPC service, each listing its methods
//! - `dto.rs`: request/response bodies
//! - `errors.rs`: error taxonomy to HTTP mapping

use std::sync::Arc;

use anyhow::Context;
use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use kinship_auth::{AccessPolicy, AuthGateway, PolicyError, Role, TokenManager};

use crate::config::AppConfig;
use crate::middleware::{self, GatewayState};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use routes::{family, invite, leadership};

const ANY_ROLE: &[Role] = &[Role::User, Role::Admin];

/// Who may call what. Anything not listed is denied.
pub fn access_policy() -> Result<AccessPolicy, PolicyError> {
    AccessPolicy::builder()
        .allow(family::CREATE_FAMILY, ANY_ROLE)
        .allow(family::LEAVE_FAMILY, ANY_ROLE)
        .allow(family::GET_FAMILY_INFO, ANY_ROLE)
        .allow(invite::GET_INVITES, ANY_ROLE)
        .allow(invite::SEND_INVITE, ANY_ROLE)
        .allow(invite::ACCEPT_INVITE, ANY_ROLE)
        .allow(invite::DENY_INVITE, ANY_ROLE)
        .allow(invite::DELETE_USER_INVITES, &[Role::Admin])
        .allow(leadership::REMOVE_USER, ANY_ROLE)
        .allow(leadership::DELETE_FAMILY, ANY_ROLE)
        .build()
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: &AppConfig) -> anyhow::Result<Router> {
    let services = services::build_services(config).await?;
    let tokens = TokenManager::new(config.jwt_secret.as_bytes());
    build_router(services, tokens)
}

/// Router over already-built services.
///
/// Fails if the access policy does not cover exactly the served methods.
pub fn build_router(services: services::AppServices, tokens: TokenManager) -> anyhow::Result<Router> {
    let policy = access_policy().context("building access policy")?;
    let rpc = routes::rpc_routes();
    policy
        .validate(rpc.methods().iter().copied())
        .context("access policy does not match served methods")?;

    let gateway = AuthGateway::new(Arc::new(policy), Arc::new(tokens));

    // Every RPC route and the fallback sit behind the gateway.
    let protected = rpc
        .into_router()
        .fallback(routes::system::unknown_method)
        .layer(Extension(Arc::new(services)))
        .layer(axum::middleware::from_fn_with_state(
            GatewayState { gateway },
            middleware::gateway_middleware,
        ));

    Ok(Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new()))
}

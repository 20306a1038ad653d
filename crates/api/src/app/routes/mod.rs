use axum::{
    extract::rejection::JsonRejection,
    handler::Handler,
    http::StatusCode,
    response::Response,
    routing::post,
    Json, Router,
};

use crate::app::errors;

pub mod family;
pub mod invite;
pub mod leadership;
pub mod system;

/// Router that remembers which RPC methods it exposes, so the access policy
/// can be checked against exactly what is served.
#[derive(Default)]
pub struct RpcRoutes {
    router: Router,
    methods: Vec<&'static str>,
}

impl RpcRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rpc<H, T>(mut self, method: &'static str, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.router = self.router.route(method, post(handler));
        self.methods.push(method);
        self
    }

    pub fn merge(mut self, other: RpcRoutes) -> Self {
        self.router = self.router.merge(other.router);
        self.methods.extend(other.methods);
        self
    }

    pub fn methods(&self) -> &[&'static str] {
        &self.methods
    }

    pub fn into_router(self) -> Router {
        self.router
    }
}

/// Every RPC method served by this process.
pub fn rpc_routes() -> RpcRoutes {
    RpcRoutes::new()
        .merge(family::routes())
        .merge(invite::routes())
        .merge(leadership::routes())
}

/// Unwrap a JSON body, turning extractor rejections into the JSON error shape.
pub(crate) fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| errors::json_error(StatusCode::BAD_REQUEST, "invalid_argument", rejection.body_text()))
}

use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, response::Response, Extension, Json};

use kinship_auth::Principal;

use crate::app::routes::{body, RpcRoutes};
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub const CREATE_FAMILY: &str = "/family.Family/CreateFamily";
pub const LEAVE_FAMILY: &str = "/family.Family/LeaveFamily";
pub const GET_FAMILY_INFO: &str = "/family.Family/GetFamilyInfo";

pub fn routes() -> RpcRoutes {
    RpcRoutes::new()
        .rpc(CREATE_FAMILY, create_family)
        .rpc(LEAVE_FAMILY, leave_family)
        .rpc(GET_FAMILY_INFO, get_family_info)
}

pub async fn create_family(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> Response {
    match services.families.create_family(&principal).await {
        Ok(created) => errors::respond(
            dto::CreateFamilyResponse {
                family_id: created.value,
            },
            created.sync_error,
        ),
        Err(e) => errors::domain_error("family.create", e),
    }
}

pub async fn leave_family(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<dto::FamilyRequest>, JsonRejection>,
) -> Response {
    let req = match body(payload) {
        Ok(req) => req,
        Err(res) => return res,
    };
    match services.families.leave_family(&principal, req.family_id).await {
        Ok(left) => errors::respond(dto::Succeed::YES, left.sync_error),
        Err(e) => errors::domain_error("family.leave", e),
    }
}

pub async fn get_family_info(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<dto::FamilyRequest>, JsonRejection>,
) -> Response {
    let req = match body(payload) {
        Ok(req) => req,
        Err(res) => return res,
    };
    match services.families.get_family_members(&principal, req.family_id).await {
        Ok(info) => errors::respond(dto::FamilyInfoResponse { info: info.value }, info.sync_error),
        Err(e) => errors::domain_error("family.get_info", e),
    }
}

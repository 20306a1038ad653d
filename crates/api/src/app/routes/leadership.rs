use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, response::Response, Extension, Json};

use kinship_auth::Principal;

use crate::app::routes::{body, RpcRoutes};
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub const REMOVE_USER: &str = "/family.FamilyLeader/RemoveUser";
pub const DELETE_FAMILY: &str = "/family.FamilyLeader/DeleteFamily";

pub fn routes() -> RpcRoutes {
    RpcRoutes::new()
        .rpc(REMOVE_USER, remove_user)
        .rpc(DELETE_FAMILY, delete_family)
}

pub async fn remove_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<dto::FamilyMemberRequest>, JsonRejection>,
) -> Response {
    let req = match body(payload) {
        Ok(req) => req,
        Err(res) => return res,
    };
    match services
        .leadership
        .remove_member(&principal, req.family_id, req.user_id)
        .await
    {
        Ok(removed) => errors::respond(dto::Succeed::YES, removed.sync_error),
        Err(e) => errors::domain_error("family.remove_user", e),
    }
}

/// The deletion stands even when some members keep a stale directory entry;
/// those are listed in the body rather than failing the call.
pub async fn delete_family(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<dto::FamilyRequest>, JsonRejection>,
) -> Response {
    let req = match body(payload) {
        Ok(req) => req,
        Err(res) => return res,
    };
    match services.leadership.delete_family(&principal, req.family_id).await {
        Ok(deletion) => errors::respond(
            dto::DeleteFamilyResponse {
                succeed: true,
                former_members: deletion.former_members,
                detach_failures: deletion.detach_failures,
            },
            None,
        ),
        Err(e) => errors::domain_error("family.delete", e),
    }
}

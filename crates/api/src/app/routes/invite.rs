use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, response::Response, Extension, Json};

use kinship_auth::Principal;

use crate::app::routes::{body, RpcRoutes};
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub const GET_INVITES: &str = "/family.Invite/GetInvites";
pub const SEND_INVITE: &str = "/family.Invite/SendInvite";
pub const ACCEPT_INVITE: &str = "/family.Invite/AcceptInvite";
pub const DENY_INVITE: &str = "/family.Invite/DenyInvite";
pub const DELETE_USER_INVITES: &str = "/family.Invite/DeleteUserInvites";

pub fn routes() -> RpcRoutes {
    RpcRoutes::new()
        .rpc(GET_INVITES, get_invites)
        .rpc(SEND_INVITE, send_invite)
        .rpc(ACCEPT_INVITE, accept_invite)
        .rpc(DENY_INVITE, deny_invite)
        .rpc(DELETE_USER_INVITES, delete_user_invites)
}

pub async fn get_invites(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> Response {
    match services.invites.get_invites(&principal).await {
        Ok(invites) => errors::respond(dto::InvitesResponse { invites }, None),
        Err(e) => errors::domain_error("invite.list", e),
    }
}

pub async fn send_invite(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<dto::FamilyMemberRequest>, JsonRejection>,
) -> Response {
    let req = match body(payload) {
        Ok(req) => req,
        Err(res) => return res,
    };
    match services
        .invites
        .send_invite(&principal, req.family_id, req.user_id)
        .await
    {
        Ok(invite_id) => errors::respond(
            dto::SendInviteResponse {
                succeed: true,
                invite_id,
            },
            None,
        ),
        Err(e) => errors::domain_error("invite.send", e),
    }
}

pub async fn accept_invite(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<dto::InviteRequest>, JsonRejection>,
) -> Response {
    let req = match body(payload) {
        Ok(req) => req,
        Err(res) => return res,
    };
    match services.invites.accept_invite(&principal, req.invite_id).await {
        Ok(joined) => errors::respond(
            dto::AcceptInviteResponse {
                succeed: true,
                family_id: joined.value,
            },
            joined.sync_error,
        ),
        Err(e) => errors::domain_error("invite.accept", e),
    }
}

pub async fn deny_invite(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<dto::InviteRequest>, JsonRejection>,
) -> Response {
    let req = match body(payload) {
        Ok(req) => req,
        Err(res) => return res,
    };
    match services.invites.deny_invite(&principal, req.invite_id).await {
        Ok(()) => errors::respond(dto::Succeed::YES, None),
        Err(e) => errors::domain_error("invite.deny", e),
    }
}

/// Admin only (enforced by the access policy).
pub async fn delete_user_invites(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::UserRequest>, JsonRejection>,
) -> Response {
    let req = match body(payload) {
        Ok(req) => req,
        Err(res) => return res,
    };
    match services.invites.delete_user_invites(req.user_id).await {
        Ok(deleted) => errors::respond(
            dto::DeleteUserInvitesResponse {
                succeed: true,
                deleted,
            },
            None,
        ),
        Err(e) => errors::domain_error("invite.delete_user_invites", e),
    }
}

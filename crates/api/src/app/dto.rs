use serde::{Deserialize, Serialize};

use kinship_core::{FamilyId, Invite, InviteId, UserId, UserProfile};
use kinship_membership::SyncFailure;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct FamilyRequest {
    pub family_id: FamilyId,
}

#[derive(Debug, Deserialize)]
pub struct FamilyMemberRequest {
    pub family_id: FamilyId,
    pub user_id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub invite_id: InviteId,
}

#[derive(Debug, Deserialize)]
pub struct UserRequest {
    pub user_id: UserId,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct CreateFamilyResponse {
    pub family_id: FamilyId,
}

#[derive(Debug, Serialize)]
pub struct FamilyInfoResponse {
    pub info: Vec<UserProfile>,
}

#[derive(Debug, Serialize)]
pub struct InvitesResponse {
    pub invites: Vec<Invite>,
}

#[derive(Debug, Serialize)]
pub struct SendInviteResponse {
    pub succeed: bool,
    pub invite_id: InviteId,
}

#[derive(Debug, Serialize)]
pub struct AcceptInviteResponse {
    pub succeed: bool,
    pub family_id: FamilyId,
}

#[derive(Debug, Serialize)]
pub struct DeleteUserInvitesResponse {
    pub succeed: bool,
    pub deleted: u64,
}

#[derive(Debug, Serialize)]
pub struct DeleteFamilyResponse {
    pub succeed: bool,
    pub former_members: Vec<UserId>,
    /// Members whose directory record could not be updated.
    pub detach_failures: Vec<SyncFailure>,
}

/// Plain acknowledgement.
#[derive(Debug, Serialize)]
pub struct Succeed {
    pub succeed: bool,
}

impl Succeed {
    pub const YES: Succeed = Succeed { succeed: true };
}

//! Collaborator contracts consumed by the services.
//!
//! One storage adapter may implement both store traits; services only ever
//! see the trait objects. Every store method is a single atomic operation:
//! conditional variants report the violated condition as a typed
//! `DomainError` instead of letting the caller check first.

use async_trait::async_trait;
use thiserror::Error;

use kinship_core::{DomainResult, FamilyId, Invite, InviteId, MemberRemoval, UserId, UserProfile};

#[async_trait]
pub trait FamilyStore: Send + Sync {
    /// Create a family led by (and containing only) `leader`.
    async fn create(&self, leader: UserId) -> DomainResult<FamilyId>;

    async fn members_of(&self, family: FamilyId) -> DomainResult<Vec<UserId>>;

    async fn leader_of(&self, family: FamilyId) -> DomainResult<UserId>;

    async fn is_member(&self, family: FamilyId, user: UserId) -> DomainResult<bool>;

    /// Add `user`; `UserAlreadyInFamily` if present, `FamilyNotFound` if gone.
    async fn add_member(&self, family: FamilyId, user: UserId) -> DomainResult<()>;

    /// Remove `user`, reassigning leadership and deleting the family when it
    /// empties. `UserNotInFamily` if `user` is not a member.
    async fn remove_member(&self, family: FamilyId, user: UserId) -> DomainResult<MemberRemoval>;

    /// Delete the family, returning the members it had.
    async fn delete(&self, family: FamilyId) -> DomainResult<Vec<UserId>>;
}

#[async_trait]
pub trait InviteStore: Send + Sync {
    /// Insert a pending invite. Fails with `FamilyNotFound` if the family is
    /// gone, `UserAlreadyInFamily` if `user` is a member, and
    /// `InviteAlreadyExists` if one is outstanding for the same (family, user).
    async fn insert(&self, family: FamilyId, user: UserId) -> DomainResult<InviteId>;

    async fn list_for_user(&self, user: UserId) -> DomainResult<Vec<Invite>>;

    async fn exists_for(&self, family: FamilyId, user: UserId) -> DomainResult<bool>;

    /// Find-and-delete an invite addressed to `user`. The first caller wins;
    /// everyone else gets `InviteNotFound`.
    async fn consume_if_owned(&self, invite: InviteId, user: UserId) -> DomainResult<Invite>;

    /// Same precondition as [`InviteStore::consume_if_owned`], discarding the invite.
    async fn delete_if_owned(&self, invite: InviteId, user: UserId) -> DomainResult<()>;

    async fn delete_all_for_user(&self, user: UserId) -> DomainResult<u64>;

    /// Drop every invite pointing at `family` (used once the family is gone).
    async fn delete_all_for_family(&self, family: FamilyId) -> DomainResult<u64>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("user {0} not found in identity directory")]
    UserNotFound(UserId),

    #[error("identity directory unavailable: {0}")]
    Unavailable(String),

    #[error("identity directory rejected request: {0}")]
    Rejected(String),
}

/// External identity directory: canonical profiles plus each user's
/// denormalized family list.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn resolve_user(&self, user: UserId) -> Result<UserProfile, DirectoryError>;

    async fn attach_family(&self, user: UserId, family: FamilyId) -> Result<(), DirectoryError>;

    async fn detach_family(&self, user: UserId, family: FamilyId) -> Result<(), DirectoryError>;
}

//! Invite lifecycle: send, list, accept, deny, bulk discard.
//!
//! Invite state machine: `Pending -> Consumed | Discarded | BulkDiscarded`.
//! Every transition is a single find-and-delete in the store, so two racing
//! callers on the same invite see exactly one winner.

use std::sync::Arc;

use kinship_auth::Principal;
use kinship_core::{DomainError, DomainResult, FamilyId, Invite, InviteId, UserId};

use crate::family::directory_lookup_error;
use crate::ports::{FamilyStore, IdentityDirectory, InviteStore};
use crate::sync::{self, SyncFailure, Synced};

pub struct InviteService {
    invites: Arc<dyn InviteStore>,
    families: Arc<dyn FamilyStore>,
    directory: Arc<dyn IdentityDirectory>,
}

impl InviteService {
    pub fn new(
        invites: Arc<dyn InviteStore>,
        families: Arc<dyn FamilyStore>,
        directory: Arc<dyn IdentityDirectory>,
    ) -> Self {
        Self {
            invites,
            families,
            directory,
        }
    }

    /// Invite `user_id` into `family_id`. Only the leader may invite; being an
    /// admin is not enough.
    pub async fn send_invite(
        &self,
        principal: &Principal,
        family_id: FamilyId,
        user_id: UserId,
    ) -> DomainResult<InviteId> {
        let leader_id = self.families.leader_of(family_id).await?;
        if principal.user_id != leader_id {
            tracing::warn!(%family_id, caller = %principal.user_id, "only the leader may invite");
            return Err(DomainError::Forbidden);
        }

        self.directory
            .resolve_user(user_id)
            .await
            .map_err(|e| directory_lookup_error("invite.send", e))?;

        if self.invites.exists_for(family_id, user_id).await? {
            return Err(DomainError::InviteAlreadyExists { family_id, user_id });
        }
        if self.families.is_member(family_id, user_id).await? {
            return Err(DomainError::UserAlreadyInFamily { family_id, user_id });
        }

        // The insert repeats the family, membership and uniqueness checks
        // atomically, so a concurrent sender or joiner still gets a conflict.
        let invite_id = self.invites.insert(family_id, user_id).await?;
        tracing::info!(%invite_id, %family_id, %user_id, "invite sent");
        Ok(invite_id)
    }

    pub async fn get_invites(&self, principal: &Principal) -> DomainResult<Vec<Invite>> {
        self.invites.list_for_user(principal.user_id).await
    }

    /// Consume the invite and join its family.
    ///
    /// If joining fails after the invite was consumed, the invite is gone for
    /// good and the caller needs a new one.
    pub async fn accept_invite(&self, principal: &Principal, invite_id: InviteId) -> DomainResult<Synced<FamilyId>> {
        let user_id = principal.user_id;
        let invite = self.invites.consume_if_owned(invite_id, user_id).await?;
        let family_id = invite.family_id;

        if let Err(e) = self.families.add_member(family_id, user_id).await {
            tracing::warn!(%invite_id, %family_id, %user_id, error = %e, "invite consumed but membership not applied");
            return Err(e);
        }
        tracing::info!(%invite_id, %family_id, %user_id, "invite accepted");

        let failures: Vec<SyncFailure> = sync::attach(self.directory.as_ref(), "invite.accept", user_id, family_id)
            .await
            .into_iter()
            .collect();
        Ok(Synced::with_failures(family_id, "invite.accept", failures))
    }

    pub async fn deny_invite(&self, principal: &Principal, invite_id: InviteId) -> DomainResult<()> {
        self.invites.delete_if_owned(invite_id, principal.user_id).await?;
        tracing::info!(%invite_id, user_id = %principal.user_id, "invite denied");
        Ok(())
    }

    /// Discard every invite addressed to `user_id`.
    ///
    /// Restricted to admins by the access policy; no ownership check here.
    pub async fn delete_user_invites(&self, user_id: UserId) -> DomainResult<u64> {
        let deleted = self.invites.delete_all_for_user(user_id).await?;
        tracing::info!(%user_id, deleted, "user invites deleted");
        Ok(deleted)
    }
}

//! Leader (or admin) operations over a whole family.

use std::sync::Arc;

use serde::Serialize;

use kinship_auth::Principal;
use kinship_core::{DomainError, DomainResult, FamilyId, MemberRemoval, UserId};

use crate::family::{drop_family_invites, log_removal};
use crate::ports::{FamilyStore, IdentityDirectory, InviteStore};
use crate::sync::{self, SyncFailure, Synced};

/// Outcome of deleting a family.
///
/// The deletion itself is final; `detach_failures` lists former members whose
/// directory record still mentions the family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FamilyDeletion {
    pub family_id: FamilyId,
    pub former_members: Vec<UserId>,
    pub detach_failures: Vec<SyncFailure>,
}

pub struct LeadershipService {
    families: Arc<dyn FamilyStore>,
    invites: Arc<dyn InviteStore>,
    directory: Arc<dyn IdentityDirectory>,
}

impl LeadershipService {
    pub fn new(
        families: Arc<dyn FamilyStore>,
        invites: Arc<dyn InviteStore>,
        directory: Arc<dyn IdentityDirectory>,
    ) -> Self {
        Self {
            families,
            invites,
            directory,
        }
    }

    /// The family's leader, or any admin.
    pub async fn has_authority(&self, principal: &Principal, family_id: FamilyId) -> DomainResult<bool> {
        let leader_id = self.families.leader_of(family_id).await?;
        Ok(principal.user_id == leader_id || principal.is_admin())
    }

    async fn ensure_authority(&self, principal: &Principal, family_id: FamilyId) -> DomainResult<()> {
        if self.has_authority(principal, family_id).await? {
            Ok(())
        } else {
            tracing::warn!(%family_id, user_id = %principal.user_id, "caller is neither leader nor admin");
            Err(DomainError::Forbidden)
        }
    }

    pub async fn remove_member(
        &self,
        principal: &Principal,
        family_id: FamilyId,
        target: UserId,
    ) -> DomainResult<Synced<UserId>> {
        self.ensure_authority(principal, family_id).await?;

        let removal = self.families.remove_member(family_id, target).await?;
        log_removal(family_id, target, removal);
        if removal == MemberRemoval::FamilyDeleted {
            drop_family_invites(self.invites.as_ref(), family_id).await;
        }

        let failures: Vec<SyncFailure> =
            sync::detach(self.directory.as_ref(), "family.remove_member", target, family_id)
                .await
                .into_iter()
                .collect();
        Ok(Synced::with_failures(target, "family.remove_member", failures))
    }

    /// Delete the family and detach it from every former member's directory
    /// record. Individual detach failures do not stop the fan-out.
    pub async fn delete_family(&self, principal: &Principal, family_id: FamilyId) -> DomainResult<FamilyDeletion> {
        self.ensure_authority(principal, family_id).await?;

        let former_members = self.families.delete(family_id).await?;
        tracing::info!(%family_id, members = former_members.len(), "family deleted");
        drop_family_invites(self.invites.as_ref(), family_id).await;

        let mut detach_failures = Vec::new();
        for user_id in &former_members {
            if let Some(failure) =
                sync::detach(self.directory.as_ref(), "family.delete", *user_id, family_id).await
            {
                detach_failures.push(failure);
            }
        }

        Ok(FamilyDeletion {
            family_id,
            former_members,
            detach_failures,
        })
    }
}

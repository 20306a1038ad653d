//! Member-facing family operations: create, inspect, leave.

use std::sync::Arc;

use kinship_auth::Principal;
use kinship_core::{DomainError, DomainResult, FamilyId, MemberRemoval, UserId, UserProfile};

use crate::ports::{DirectoryError, FamilyStore, IdentityDirectory, InviteStore};
use crate::sync::{self, SyncFailure, Synced};

/// Knobs for the orchestration core.
#[derive(Debug, Clone, Copy, Default)]
pub struct MembershipConfig {
    /// Push the new family into the founder's directory record on creation.
    pub attach_on_create: bool,
}

pub struct FamilyService {
    families: Arc<dyn FamilyStore>,
    invites: Arc<dyn InviteStore>,
    directory: Arc<dyn IdentityDirectory>,
    config: MembershipConfig,
}

impl FamilyService {
    pub fn new(
        families: Arc<dyn FamilyStore>,
        invites: Arc<dyn InviteStore>,
        directory: Arc<dyn IdentityDirectory>,
        config: MembershipConfig,
    ) -> Self {
        Self {
            families,
            invites,
            directory,
            config,
        }
    }

    pub async fn create_family(&self, principal: &Principal) -> DomainResult<Synced<FamilyId>> {
        let family_id = self.families.create(principal.user_id).await?;
        tracing::info!(%family_id, leader_id = %principal.user_id, "family created");

        if !self.config.attach_on_create {
            return Ok(Synced::complete(family_id));
        }

        let failures: Vec<SyncFailure> =
            sync::attach(self.directory.as_ref(), "family.create", principal.user_id, family_id)
                .await
                .into_iter()
                .collect();
        Ok(Synced::with_failures(family_id, "family.create", failures))
    }

    /// Profiles of every member, visible to members only.
    ///
    /// Members whose profile cannot be resolved are left out and reported in
    /// the sync error; the rest are still returned.
    pub async fn get_family_members(
        &self,
        principal: &Principal,
        family_id: FamilyId,
    ) -> DomainResult<Synced<Vec<UserProfile>>> {
        let members = self.families.members_of(family_id).await?;
        if !members.contains(&principal.user_id) {
            tracing::warn!(%family_id, user_id = %principal.user_id, "non-member asked for family info");
            return Err(DomainError::Forbidden);
        }

        let mut profiles = Vec::with_capacity(members.len());
        let mut failures = Vec::new();
        for user_id in members {
            match self.directory.resolve_user(user_id).await {
                Ok(profile) => profiles.push(profile),
                Err(e) => {
                    tracing::error!(%family_id, %user_id, error = %e, "member profile is missing");
                    failures.push(SyncFailure {
                        user_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(Synced::with_failures(profiles, "family.get_members", failures))
    }

    /// Leave a family; returns the id of the departed user.
    pub async fn leave_family(
        &self,
        principal: &Principal,
        family_id: FamilyId,
    ) -> DomainResult<Synced<UserId>> {
        let user_id = principal.user_id;
        let removal = self.families.remove_member(family_id, user_id).await?;
        log_removal(family_id, user_id, removal);
        if removal == MemberRemoval::FamilyDeleted {
            drop_family_invites(self.invites.as_ref(), family_id).await;
        }

        let failures: Vec<SyncFailure> = sync::detach(self.directory.as_ref(), "family.leave", user_id, family_id)
            .await
            .into_iter()
            .collect();
        Ok(Synced::with_failures(user_id, "family.leave", failures))
    }
}

pub(crate) fn log_removal(family_id: FamilyId, user_id: UserId, removal: MemberRemoval) {
    match removal {
        MemberRemoval::Remaining {
            leader_id,
            leader_changed: true,
        } => tracing::info!(%family_id, %user_id, new_leader_id = %leader_id, "member removed, leadership transferred"),
        MemberRemoval::Remaining { .. } => tracing::info!(%family_id, %user_id, "member removed"),
        MemberRemoval::FamilyDeleted => tracing::info!(%family_id, %user_id, "last member removed, family deleted"),
    }
}

/// Invites to a family that no longer exists can never be honoured.
pub(crate) async fn drop_family_invites(invites: &dyn InviteStore, family_id: FamilyId) {
    match invites.delete_all_for_family(family_id).await {
        Ok(0) => {}
        Ok(n) => tracing::info!(%family_id, dropped = n, "dropped invites of deleted family"),
        Err(e) => tracing::warn!(%family_id, error = %e, "failed to drop invites of deleted family"),
    }
}

pub(crate) fn directory_lookup_error(op: &'static str, err: DirectoryError) -> DomainError {
    match err {
        DirectoryError::UserNotFound(user_id) => DomainError::UserNotFound(user_id),
        other => DomainError::internal(op, other.to_string()),
    }
}

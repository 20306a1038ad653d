//! Best-effort directory synchronisation after a committed local mutation.

use serde::Serialize;
use thiserror::Error;

use kinship_core::{ErrorKind, FamilyId, UserId};

use crate::ports::{DirectoryError, IdentityDirectory};

/// One directory update (or lookup) that did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
    pub user_id: UserId,
    /// Directory error text. Logged, never sent to clients.
    #[serde(skip)]
    pub reason: String,
}

/// Side effects of an operation that could not be completed.
///
/// The primary mutation behind it is already committed and stays that way.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{op}: {} directory operation(s) failed", failures.len())]
pub struct SyncError {
    pub op: &'static str,
    pub failures: Vec<SyncFailure>,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}

/// A committed result plus whatever part of its fan-out failed.
///
/// `value` present with `sync_error` present means partial success: the
/// mutation stands, some side effects are incomplete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synced<T> {
    pub value: T,
    pub sync_error: Option<SyncError>,
}

impl<T> Synced<T> {
    pub fn complete(value: T) -> Self {
        Self {
            value,
            sync_error: None,
        }
    }

    pub fn with_failures(value: T, op: &'static str, failures: Vec<SyncFailure>) -> Self {
        let sync_error = (!failures.is_empty()).then_some(SyncError { op, failures });
        Self { value, sync_error }
    }

    pub fn is_complete(&self) -> bool {
        self.sync_error.is_none()
    }
}

pub(crate) async fn attach(
    directory: &dyn IdentityDirectory,
    op: &'static str,
    user_id: UserId,
    family_id: FamilyId,
) -> Option<SyncFailure> {
    report(op, user_id, family_id, directory.attach_family(user_id, family_id).await)
}

pub(crate) async fn detach(
    directory: &dyn IdentityDirectory,
    op: &'static str,
    user_id: UserId,
    family_id: FamilyId,
) -> Option<SyncFailure> {
    report(op, user_id, family_id, directory.detach_family(user_id, family_id).await)
}

fn report(
    op: &'static str,
    user_id: UserId,
    family_id: FamilyId,
    outcome: Result<(), DirectoryError>,
) -> Option<SyncFailure> {
    match outcome {
        Ok(()) => None,
        Err(e) => {
            tracing::error!(op, %user_id, %family_id, error = %e, "directory sync failed; local change kept");
            Some(SyncFailure {
                user_id,
                reason: e.to_string(),
            })
        }
    }
}

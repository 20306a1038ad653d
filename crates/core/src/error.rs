//! Domain error model.

use thiserror::Error;

use crate::id::{FamilyId, InviteId, UserId};

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Boundary-level error taxonomy.
///
/// Every error produced anywhere in the system maps onto exactly one of these
/// kinds when it crosses the transport boundary.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unauthenticated,
    PermissionDenied,
    NotFound,
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Internal => "internal",
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain-level error.
///
/// Business-rule violations are typed sentinels; anything unexpected coming
/// from a lower layer is wrapped as `Internal` together with the operation
/// that failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Caller lacks authority over the resource.
    #[error("forbidden")]
    Forbidden,

    #[error("family {0} not found")]
    FamilyNotFound(FamilyId),

    #[error("user {0} not found")]
    UserNotFound(UserId),

    #[error("user {user_id} is not a member of family {family_id}")]
    UserNotInFamily { family_id: FamilyId, user_id: UserId },

    #[error("user {user_id} is already a member of family {family_id}")]
    UserAlreadyInFamily { family_id: FamilyId, user_id: UserId },

    /// Invite is absent or addressed to someone else.
    #[error("invite {0} not found")]
    InviteNotFound(InviteId),

    #[error("user {user_id} is already invited to family {family_id}")]
    InviteAlreadyExists { family_id: FamilyId, user_id: UserId },

    /// Unexpected lower-layer fault (store, directory, decode).
    #[error("{op}: {message}")]
    Internal { op: &'static str, message: String },
}

impl DomainError {
    pub fn internal(op: &'static str, message: impl Into<String>) -> Self {
        Self::Internal {
            op,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Forbidden => ErrorKind::PermissionDenied,
            DomainError::FamilyNotFound(_)
            | DomainError::UserNotFound(_)
            | DomainError::UserNotInFamily { .. }
            | DomainError::InviteNotFound(_) => ErrorKind::NotFound,
            DomainError::UserAlreadyInFamily { .. } | DomainError::InviteAlreadyExists { .. } => {
                ErrorKind::Conflict
            }
            DomainError::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Message safe to hand to a remote caller.
    ///
    /// Internal faults collapse to a generic message so storage and directory
    /// details never leave the process.
    pub fn public_message(&self) -> String {
        match self {
            DomainError::Internal { .. } => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

use kinship_core::UserId;

use crate::{Claims, Role};

/// Authenticated caller of a single request.
///
/// Derived per call from a verified token and threaded explicitly through
/// every service method; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
    pub email: String,
}

impl Principal {
    pub fn new(user_id: UserId, role: Role, email: impl Into<String>) -> Self {
        Self {
            user_id,
            role,
            email: email.into(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            role: claims.role,
            email: claims.email,
        }
    }
}

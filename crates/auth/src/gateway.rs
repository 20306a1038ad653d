//! Per-call admission: policy lookup, authentication, role check.
//!
//! - No IO
//! - No panics
//! - Same decision for every call shape (unary or streaming); the transport
//!   only supplies the method identifier and the raw `authorization` value.

use std::sync::Arc;

use thiserror::Error;

use kinship_core::ErrorKind;

use crate::{AccessPolicy, Principal, Role, TokenError, TokenManager};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The method has no policy entry (fails closed).
    #[error("method '{0}' is not exposed")]
    UnlistedMethod(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(#[from] TokenError),

    #[error("role '{role}' may not call '{method}'")]
    RoleNotAllowed { method: String, role: Role },
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Unauthenticated(_) => ErrorKind::Unauthenticated,
            GatewayError::UnlistedMethod(_) | GatewayError::RoleNotAllowed { .. } => {
                ErrorKind::PermissionDenied
            }
        }
    }
}

#[derive(Clone)]
pub struct AuthGateway {
    policy: Arc<AccessPolicy>,
    tokens: Arc<TokenManager>,
}

impl AuthGateway {
    pub fn new(policy: Arc<AccessPolicy>, tokens: Arc<TokenManager>) -> Self {
        Self { policy, tokens }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Decide whether a call to `method` may proceed.
    ///
    /// The policy is consulted before the credential so that unlisted methods
    /// are unreachable regardless of who calls them.
    pub fn admit(&self, method: &str, authorization: Option<&str>) -> Result<Principal, GatewayError> {
        let allowed = self
            .policy
            .allowed_roles(method)
            .ok_or_else(|| GatewayError::UnlistedMethod(method.to_string()))?;

        let principal = self.tokens.identity(authorization)?;

        if !allowed.contains(&principal.role) {
            return Err(GatewayError::RoleNotAllowed {
                method: method.to_string(),
                role: principal.role,
            });
        }

        tracing::debug!(method, user_id = %principal.user_id, role = %principal.role, "call admitted");
        Ok(principal)
    }
}

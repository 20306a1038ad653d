//! Bearer token verification.

use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::claims::ClaimsProblem;
use crate::{Claims, Principal};

const BEARER: &str = "Bearer ";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("authorization token was not provided")]
    NoToken,

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("malformed token")]
    Malformed,

    #[error("claim '{0}' was not found")]
    MissingClaim(&'static str),

    #[error("claim '{0}' is invalid")]
    InvalidClaim(&'static str),

    #[error("failed to sign token")]
    Signing,
}

/// HMAC-signed JWT verifier (and issuer, for service-side tokens and tests).
pub struct TokenManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenManager {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        // `exp` is honoured when present but tokens without it are accepted.
        validation.required_spec_claims.clear();
        validation.validate_aud = false;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Verify the signature and extract the required claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = jsonwebtoken::decode::<Map<String, Value>>(token, &self.decoding, &self.validation)
            .map_err(|e| match e.kind() {
                JwtErrorKind::InvalidSignature => TokenError::InvalidSignature,
                JwtErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            })?;

        Claims::from_payload(&data.claims).map_err(|p| match p {
            ClaimsProblem::Missing(field) => TokenError::MissingClaim(field),
            ClaimsProblem::Invalid(field) => TokenError::InvalidClaim(field),
        })
    }

    /// Resolve the caller from the raw `authorization` metadata value.
    ///
    /// The value must be exactly `Bearer <token>`; anything else counts as no
    /// token at all.
    pub fn identity(&self, authorization: Option<&str>) -> Result<Principal, TokenError> {
        let token = bearer_token(authorization).ok_or(TokenError::NoToken)?;
        self.verify(token).map(Principal::from)
    }

    pub fn issue(&self, claims: &Claims) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|_| TokenError::Signing)
    }
}

fn bearer_token(authorization: Option<&str>) -> Option<&str> {
    let token = authorization?.strip_prefix(BEARER)?.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return None;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use kinship_core::UserId;
    use serde_json::json;

    const SECRET: &[u8] = b"test-secret";

    fn sign_raw(payload: Value, secret: &[u8]) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &payload,
            &EncodingKey::from_secret(secret),
        )
        .unwrap()
    }

    #[test]
    fn issued_token_round_trips_to_principal() {
        let tm = TokenManager::new(SECRET);
        let token = tm
            .issue(&Claims {
                user_id: UserId::new(5),
                role: Role::Admin,
                email: "root@example.com".to_string(),
                exp: None,
            })
            .unwrap();

        let principal = tm.identity(Some(&format!("Bearer {token}"))).unwrap();
        assert_eq!(principal.user_id, UserId::new(5));
        assert!(principal.is_admin());
        assert_eq!(principal.email, "root@example.com");
    }

    #[test]
    fn wrong_secret_is_invalid_signature() {
        let tm = TokenManager::new(SECRET);
        let token = sign_raw(json!({"user_id": 1, "role": "user", "email": "a@b.c"}), b"other");
        assert_eq!(tm.verify(&token).unwrap_err(), TokenError::InvalidSignature);
    }

    #[test]
    fn garbage_is_malformed() {
        let tm = TokenManager::new(SECRET);
        assert_eq!(tm.verify("not-a-jwt").unwrap_err(), TokenError::Malformed);
    }

    #[test]
    fn expired_token_is_rejected() {
        let tm = TokenManager::new(SECRET);
        let exp = chrono::Utc::now().timestamp() - 3600;
        let token = sign_raw(
            json!({"user_id": 1, "role": "user", "email": "a@b.c", "exp": exp}),
            SECRET,
        );
        assert_eq!(tm.verify(&token).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn every_required_claim_is_enforced() {
        let tm = TokenManager::new(SECRET);
        let full = json!({"user_id": 1, "role": "user", "email": "a@b.c"});
        for field in ["user_id", "role", "email"] {
            let mut payload = full.clone();
            payload.as_object_mut().unwrap().remove(field);
            let token = sign_raw(payload, SECRET);
            assert_eq!(tm.verify(&token).unwrap_err(), TokenError::MissingClaim(field));
            assert!(tm.identity(Some(&format!("Bearer {token}"))).is_err());
        }
    }

    #[test]
    fn bearer_metadata_must_be_well_formed() {
        let tm = TokenManager::new(SECRET);
        let token = sign_raw(json!({"user_id": 1, "role": "user", "email": "a@b.c"}), SECRET);

        assert_eq!(tm.identity(None).unwrap_err(), TokenError::NoToken);
        assert_eq!(tm.identity(Some("")).unwrap_err(), TokenError::NoToken);
        assert_eq!(tm.identity(Some("Bearer ")).unwrap_err(), TokenError::NoToken);
        assert_eq!(tm.identity(Some(&token)).unwrap_err(), TokenError::NoToken);
        assert_eq!(
            tm.identity(Some(&format!("Basic {token}"))).unwrap_err(),
            TokenError::NoToken
        );
        assert!(tm.identity(Some(&format!("Bearer {token}"))).is_ok());
    }
}

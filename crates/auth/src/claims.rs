use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use kinship_core::UserId;

use crate::Role;

/// JWT claims model (transport-agnostic).
///
/// This is the minimal set of claims the service expects once a token has been
/// decoded and its signature verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: UserId,
    pub role: Role,
    pub email: String,

    /// Expiration (seconds since epoch). Enforced when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// Why a decoded payload could not be turned into [`Claims`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimsProblem {
    Missing(&'static str),
    Invalid(&'static str),
}

pub(crate) const REQUIRED: [&str; 3] = ["user_id", "role", "email"];

impl Claims {
    /// Extract typed claims from an already verified payload.
    ///
    /// Presence of every required claim is checked before any of them is
    /// interpreted, so a token lacking `email` reports `email` even when its
    /// `user_id` is also malformed.
    pub(crate) fn from_payload(payload: &Map<String, Value>) -> Result<Self, ClaimsProblem> {
        if let Some(missing) = REQUIRED.iter().copied().find(|k| !payload.contains_key(*k)) {
            return Err(ClaimsProblem::Missing(missing));
        }

        let user_id = payload
            .get("user_id")
            .and_then(numeric_id)
            .ok_or(ClaimsProblem::Invalid("user_id"))?;

        let role = payload
            .get("role")
            .and_then(Value::as_str)
            .and_then(|r| r.parse::<Role>().ok())
            .ok_or(ClaimsProblem::Invalid("role"))?;

        let email = payload
            .get("email")
            .and_then(Value::as_str)
            .ok_or(ClaimsProblem::Invalid("email"))?
            .to_string();

        let exp = payload.get("exp").and_then(Value::as_i64);

        Ok(Self {
            user_id: UserId::new(user_id),
            role,
            email,
            exp,
        })
    }
}

// Issuers commonly encode ids as JSON floats; accept them when integral.
// `i64::MAX as f64` rounds up to 2^63, which is already out of range.
fn numeric_id(value: &Value) -> Option<i64> {
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    let f = value.as_f64()?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

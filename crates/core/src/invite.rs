//! Invite record.
//!
//! An invite is a one-shot offer: it is created pending and destroyed exactly
//! once (accepted, denied, or bulk-discarded). There is no resurrection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{FamilyId, InviteId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invite {
    pub id: InviteId,
    pub family_id: FamilyId,
    /// The invited user (the only one allowed to accept or deny).
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl Invite {
    pub fn is_addressed_to(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }
}

//! Family record and its membership invariants.
//!
//! # Invariants
//! - `leader_id` is always one of `members`.
//! - `members` is never empty while the family exists; removing the last
//!   member consumes the record.
//! - a user appears in `members` at most once (join order is kept).

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::{FamilyId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Family {
    id: FamilyId,
    leader_id: UserId,
    members: Vec<UserId>,
}

/// What happened to a family after a member left or was removed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MemberRemoval {
    /// The family still exists under `leader_id`.
    Remaining { leader_id: UserId, leader_changed: bool },
    /// The removed user was the last member; the family no longer exists.
    FamilyDeleted,
}

impl Family {
    /// A freshly founded family: the founder leads and is the only member.
    pub fn found(id: FamilyId, founder: UserId) -> Self {
        Self {
            id,
            leader_id: founder,
            members: vec![founder],
        }
    }

    /// Rebuild a family from persisted fields, rejecting records that break
    /// the invariants.
    pub fn restore(id: FamilyId, leader_id: UserId, members: Vec<UserId>) -> DomainResult<Self> {
        if members.is_empty() {
            return Err(DomainError::internal(
                "family.restore",
                format!("family {id} has no members"),
            ));
        }
        if !members.contains(&leader_id) {
            return Err(DomainError::internal(
                "family.restore",
                format!("family {id} leader {leader_id} is not a member"),
            ));
        }
        let mut seen = std::collections::HashSet::with_capacity(members.len());
        if !members.iter().all(|m| seen.insert(*m)) {
            return Err(DomainError::internal(
                "family.restore",
                format!("family {id} has duplicate members"),
            ));
        }
        Ok(Self {
            id,
            leader_id,
            members,
        })
    }

    pub fn leader_id(&self) -> UserId {
        self.leader_id
    }

    pub fn members(&self) -> &[UserId] {
        &self.members
    }

    pub fn is_member(&self, user_id: UserId) -> bool {
        self.members.contains(&user_id)
    }

    pub fn add_member(&mut self, user_id: UserId) -> DomainResult<()> {
        if self.is_member(user_id) {
            return Err(DomainError::UserAlreadyInFamily {
                family_id: self.id,
                user_id,
            });
        }
        self.members.push(user_id);
        Ok(())
    }

    /// Remove a member, consuming the record.
    ///
    /// If the leader leaves, leadership passes to the earliest-joined remaining
    /// member. Returns `None` for the family when nobody is left.
    pub fn remove_member(mut self, user_id: UserId) -> DomainResult<(Option<Family>, MemberRemoval)> {
        let Some(pos) = self.members.iter().position(|m| *m == user_id) else {
            return Err(DomainError::UserNotInFamily {
                family_id: self.id,
                user_id,
            });
        };
        self.members.remove(pos);

        let Some(first) = self.members.first().copied() else {
            return Ok((None, MemberRemoval::FamilyDeleted));
        };

        let leader_changed = self.leader_id == user_id;
        if leader_changed {
            self.leader_id = first;
        }
        let leader_id = self.leader_id;
        Ok((
            Some(self),
            MemberRemoval::Remaining {
                leader_id,
                leader_changed,
            },
        ))
    }

    pub fn into_members(self) -> Vec<UserId> {
        self.members
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn uid(n: i64) -> UserId {
        UserId::new(n)
    }

    #[test]
    fn founder_leads_alone() {
        let family = Family::found(FamilyId::new(1), uid(10));
        assert_eq!(family.leader_id(), uid(10));
        assert_eq!(family.members(), &[uid(10)]);
    }

    #[test]
    fn adding_existing_member_conflicts() {
        let mut family = Family::found(FamilyId::new(1), uid(10));
        let err = family.add_member(uid(10)).unwrap_err();
        assert!(matches!(err, DomainError::UserAlreadyInFamily { .. }));
        assert_eq!(family.members().len(), 1);
    }

    #[test]
    fn leader_removal_hands_over_to_earliest_member() {
        let mut family = Family::found(FamilyId::new(1), uid(10));
        family.add_member(uid(20)).unwrap();
        family.add_member(uid(30)).unwrap();

        let (family, removal) = family.remove_member(uid(10)).unwrap();
        let family = family.expect("family should survive");
        assert_eq!(
            removal,
            MemberRemoval::Remaining {
                leader_id: uid(20),
                leader_changed: true
            }
        );
        assert_eq!(family.leader_id(), uid(20));
        assert_eq!(family.members(), &[uid(20), uid(30)]);
    }

    #[test]
    fn last_member_removal_deletes_family() {
        let family = Family::found(FamilyId::new(1), uid(10));
        let (family, removal) = family.remove_member(uid(10)).unwrap();
        assert!(family.is_none());
        assert_eq!(removal, MemberRemoval::FamilyDeleted);
    }

    #[test]
    fn removing_stranger_is_rejected() {
        let family = Family::found(FamilyId::new(1), uid(10));
        let err = family.remove_member(uid(99)).unwrap_err();
        assert!(matches!(err, DomainError::UserNotInFamily { .. }));
    }

    #[test]
    fn restore_rejects_broken_records() {
        assert!(Family::restore(FamilyId::new(1), uid(1), vec![]).is_err());
        assert!(Family::restore(FamilyId::new(1), uid(1), vec![uid(2)]).is_err());
        assert!(Family::restore(FamilyId::new(1), uid(1), vec![uid(1), uid(1)]).is_err());
        assert!(Family::restore(FamilyId::new(1), uid(1), vec![uid(2), uid(1)]).is_ok());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(i64),
        Remove(i64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![(0i64..6).prop_map(Op::Add), (0i64..6).prop_map(Op::Remove)]
    }

    proptest! {
        #[test]
        fn family_is_never_empty_and_always_led_by_a_member(
            ops in proptest::collection::vec(op(), 0..40)
        ) {
            let mut current = Some(Family::found(FamilyId::new(1), uid(0)));
            for op in ops {
                let Some(mut family) = current.take() else { break };
                match op {
                    Op::Add(u) => {
                        let _ = family.add_member(uid(u));
                        current = Some(family);
                    }
                    Op::Remove(u) => {
                        current = match family.clone().remove_member(uid(u)) {
                            Ok((next, _)) => next,
                            Err(_) => Some(family),
                        };
                    }
                }
                if let Some(f) = &current {
                    prop_assert!(!f.members().is_empty());
                    prop_assert!(f.is_member(f.leader_id()));
                    let mut sorted = f.members().to_vec();
                    sorted.sort();
                    sorted.dedup();
                    prop_assert_eq!(sorted.len(), f.members().len());
                }
            }
        }
    }
}

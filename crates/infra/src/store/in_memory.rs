use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use kinship_core::{DomainError, DomainResult, Family, FamilyId, Invite, InviteId, MemberRemoval, UserId};
use kinship_membership::{FamilyStore, InviteStore};

#[derive(Debug, Default)]
struct State {
    next_family_id: i64,
    next_invite_id: i64,
    families: BTreeMap<FamilyId, Family>,
    invites: BTreeMap<InviteId, Invite>,
}

impl State {
    fn family(&self, id: FamilyId) -> DomainResult<&Family> {
        self.families.get(&id).ok_or(DomainError::FamilyNotFound(id))
    }

    fn owned_invite(&self, invite: InviteId, user: UserId) -> DomainResult<()> {
        match self.invites.get(&invite) {
            Some(i) if i.is_addressed_to(user) => Ok(()),
            _ => Err(DomainError::InviteNotFound(invite)),
        }
    }
}

/// In-memory family + invite store.
///
/// Intended for tests/dev. Every trait method runs under one write (or read)
/// guard, so each call is atomic with respect to every other.
#[derive(Debug, Default)]
pub struct InMemoryMembershipStore {
    state: RwLock<State>,
}

impl InMemoryMembershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self, op: &'static str) -> DomainResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| DomainError::internal(op, "lock poisoned"))
    }

    fn write(&self, op: &'static str) -> DomainResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| DomainError::internal(op, "lock poisoned"))
    }

    /// Number of live families (test helper).
    pub fn family_count(&self) -> usize {
        self.state.read().map(|s| s.families.len()).unwrap_or(0)
    }

    /// Number of pending invites (test helper).
    pub fn invite_count(&self) -> usize {
        self.state.read().map(|s| s.invites.len()).unwrap_or(0)
    }
}

#[async_trait]
impl FamilyStore for InMemoryMembershipStore {
    async fn create(&self, leader: UserId) -> DomainResult<FamilyId> {
        let mut state = self.write("family_store.create")?;
        state.next_family_id += 1;
        let id = FamilyId::new(state.next_family_id);
        state.families.insert(id, Family::found(id, leader));
        Ok(id)
    }

    async fn members_of(&self, family: FamilyId) -> DomainResult<Vec<UserId>> {
        let state = self.read("family_store.members_of")?;
        Ok(state.family(family)?.members().to_vec())
    }

    async fn leader_of(&self, family: FamilyId) -> DomainResult<UserId> {
        let state = self.read("family_store.leader_of")?;
        Ok(state.family(family)?.leader_id())
    }

    async fn is_member(&self, family: FamilyId, user: UserId) -> DomainResult<bool> {
        let state = self.read("family_store.is_member")?;
        Ok(state.family(family)?.is_member(user))
    }

    async fn add_member(&self, family: FamilyId, user: UserId) -> DomainResult<()> {
        let mut state = self.write("family_store.add_member")?;
        state
            .families
            .get_mut(&family)
            .ok_or(DomainError::FamilyNotFound(family))?
            .add_member(user)
    }

    async fn remove_member(&self, family: FamilyId, user: UserId) -> DomainResult<MemberRemoval> {
        let mut state = self.write("family_store.remove_member")?;
        let record = state.family(family)?;
        if !record.is_member(user) {
            return Err(DomainError::UserNotInFamily {
                family_id: family,
                user_id: user,
            });
        }

        let record = state
            .families
            .remove(&family)
            .ok_or(DomainError::FamilyNotFound(family))?;
        let (remaining, removal) = record.remove_member(user)?;
        if let Some(remaining) = remaining {
            state.families.insert(family, remaining);
        }
        Ok(removal)
    }

    async fn delete(&self, family: FamilyId) -> DomainResult<Vec<UserId>> {
        let mut state = self.write("family_store.delete")?;
        state
            .families
            .remove(&family)
            .map(Family::into_members)
            .ok_or(DomainError::FamilyNotFound(family))
    }
}

#[async_trait]
impl InviteStore for InMemoryMembershipStore {
    async fn insert(&self, family: FamilyId, user: UserId) -> DomainResult<InviteId> {
        let mut state = self.write("invite_store.insert")?;
        if state.family(family)?.is_member(user) {
            return Err(DomainError::UserAlreadyInFamily {
                family_id: family,
                user_id: user,
            });
        }
        if state
            .invites
            .values()
            .any(|i| i.family_id == family && i.user_id == user)
        {
            return Err(DomainError::InviteAlreadyExists {
                family_id: family,
                user_id: user,
            });
        }

        state.next_invite_id += 1;
        let id = InviteId::new(state.next_invite_id);
        state.invites.insert(
            id,
            Invite {
                id,
                family_id: family,
                user_id: user,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn list_for_user(&self, user: UserId) -> DomainResult<Vec<Invite>> {
        let state = self.read("invite_store.list_for_user")?;
        Ok(state
            .invites
            .values()
            .filter(|i| i.is_addressed_to(user))
            .cloned()
            .collect())
    }

    async fn exists_for(&self, family: FamilyId, user: UserId) -> DomainResult<bool> {
        let state = self.read("invite_store.exists_for")?;
        Ok(state
            .invites
            .values()
            .any(|i| i.family_id == family && i.user_id == user))
    }

    async fn consume_if_owned(&self, invite: InviteId, user: UserId) -> DomainResult<Invite> {
        let mut state = self.write("invite_store.consume_if_owned")?;
        state.owned_invite(invite, user)?;
        state
            .invites
            .remove(&invite)
            .ok_or(DomainError::InviteNotFound(invite))
    }

    async fn delete_if_owned(&self, invite: InviteId, user: UserId) -> DomainResult<()> {
        let mut state = self.write("invite_store.delete_if_owned")?;
        state.owned_invite(invite, user)?;
        state.invites.remove(&invite);
        Ok(())
    }

    async fn delete_all_for_user(&self, user: UserId) -> DomainResult<u64> {
        let mut state = self.write("invite_store.delete_all_for_user")?;
        let before = state.invites.len();
        state.invites.retain(|_, i| !i.is_addressed_to(user));
        Ok((before - state.invites.len()) as u64)
    }

    async fn delete_all_for_family(&self, family: FamilyId) -> DomainResult<u64> {
        let mut state = self.write("invite_store.delete_all_for_family")?;
        let before = state.invites.len();
        state.invites.retain(|_, i| i.family_id != family);
        Ok((before - state.invites.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn uid(n: i64) -> UserId {
        UserId::new(n)
    }

    #[tokio::test]
    async fn create_makes_founder_sole_member_and_leader() {
        let store = InMemoryMembershipStore::new();
        let id = store.create(uid(1)).await.unwrap();

        assert_eq!(store.members_of(id).await.unwrap(), vec![uid(1)]);
        assert_eq!(store.leader_of(id).await.unwrap(), uid(1));
        assert!(store.is_member(id, uid(1)).await.unwrap());
    }

    #[tokio::test]
    async fn ids_are_not_reused() {
        let store = InMemoryMembershipStore::new();
        let first = store.create(uid(1)).await.unwrap();
        store.remove_member(first, uid(1)).await.unwrap();
        let second = store.create(uid(1)).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn unknown_family_is_not_found() {
        let store = InMemoryMembershipStore::new();
        let missing = FamilyId::new(99);
        assert_eq!(
            store.leader_of(missing).await.unwrap_err(),
            DomainError::FamilyNotFound(missing)
        );
        assert_eq!(
            store.add_member(missing, uid(2)).await.unwrap_err(),
            DomainError::FamilyNotFound(missing)
        );
    }

    #[tokio::test]
    async fn removing_the_last_member_deletes_the_family() {
        let store = InMemoryMembershipStore::new();
        let id = store.create(uid(1)).await.unwrap();

        let removal = store.remove_member(id, uid(1)).await.unwrap();
        assert_eq!(removal, MemberRemoval::FamilyDeleted);
        assert_eq!(store.family_count(), 0);
    }

    #[tokio::test]
    async fn removing_a_non_member_leaves_family_untouched() {
        let store = InMemoryMembershipStore::new();
        let id = store.create(uid(1)).await.unwrap();

        let err = store.remove_member(id, uid(7)).await.unwrap_err();
        assert_eq!(
            err,
            DomainError::UserNotInFamily {
                family_id: id,
                user_id: uid(7)
            }
        );
        assert_eq!(store.members_of(id).await.unwrap(), vec![uid(1)]);
    }

    #[tokio::test]
    async fn duplicate_invite_is_rejected() {
        let store = InMemoryMembershipStore::new();
        let family = store.create(uid(1)).await.unwrap();
        store.insert(family, uid(2)).await.unwrap();

        let err = store.insert(family, uid(2)).await.unwrap_err();
        assert!(matches!(err, DomainError::InviteAlreadyExists { .. }));
        assert_eq!(store.invite_count(), 1);
    }

    #[tokio::test]
    async fn invite_requires_live_family_and_non_member() {
        let store = InMemoryMembershipStore::new();
        let family = store.create(uid(1)).await.unwrap();
        store.add_member(family, uid(2)).await.unwrap();

        assert_eq!(
            store.insert(family, uid(2)).await.unwrap_err(),
            DomainError::UserAlreadyInFamily {
                family_id: family,
                user_id: uid(2)
            }
        );

        store.remove_member(family, uid(1)).await.unwrap();
        store.remove_member(family, uid(2)).await.unwrap();
        assert_eq!(
            store.insert(family, uid(3)).await.unwrap_err(),
            DomainError::FamilyNotFound(family)
        );
        assert_eq!(store.invite_count(), 0);
    }

    #[tokio::test]
    async fn consume_checks_addressee() {
        let store = InMemoryMembershipStore::new();
        let family = store.create(uid(1)).await.unwrap();
        let invite = store.insert(family, uid(2)).await.unwrap();

        assert_eq!(
            store.consume_if_owned(invite, uid(3)).await.unwrap_err(),
            DomainError::InviteNotFound(invite)
        );
        let consumed = store.consume_if_owned(invite, uid(2)).await.unwrap();
        assert_eq!(consumed.id, invite);
        assert_eq!(
            store.delete_if_owned(invite, uid(2)).await.unwrap_err(),
            DomainError::InviteNotFound(invite)
        );
    }

    #[tokio::test]
    async fn bulk_deletes_count_removed_invites() {
        let store = InMemoryMembershipStore::new();
        let first = store.create(uid(1)).await.unwrap();
        let second = store.create(uid(1)).await.unwrap();
        store.insert(first, uid(2)).await.unwrap();
        store.insert(second, uid(2)).await.unwrap();
        store.insert(second, uid(3)).await.unwrap();

        assert_eq!(store.delete_all_for_user(uid(2)).await.unwrap(), 2);
        assert_eq!(store.delete_all_for_family(second).await.unwrap(), 1);
        assert_eq!(store.delete_all_for_user(uid(2)).await.unwrap(), 0);
        assert_eq!(store.invite_count(), 0);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(i64),
        Remove(i64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![(1i64..6).prop_map(Op::Add), (1i64..6).prop_map(Op::Remove)]
    }

    proptest! {
        #[test]
        fn family_is_never_left_empty_or_leaderless(ops in proptest::collection::vec(op(), 0..40)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let store = InMemoryMembershipStore::new();
                let id = store.create(uid(1)).await.unwrap();

                for op in ops {
                    let deleted = match op {
                        Op::Add(u) => {
                            let _ = store.add_member(id, uid(u)).await;
                            false
                        }
                        Op::Remove(u) => matches!(
                            store.remove_member(id, uid(u)).await,
                            Ok(MemberRemoval::FamilyDeleted)
                        ),
                    };
                    if deleted {
                        assert_eq!(store.family_count(), 0);
                        assert!(store.members_of(id).await.is_err());
                        break;
                    }

                    let members = store.members_of(id).await.unwrap();
                    let leader = store.leader_of(id).await.unwrap();
                    assert!(!members.is_empty());
                    assert!(members.contains(&leader));
                }
            });
        }
    }
}

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use kinship_core::{FamilyId, UserId, UserProfile};
use kinship_membership::{DirectoryError, IdentityDirectory};

#[derive(Debug, Default)]
struct Directory {
    profiles: HashMap<UserId, UserProfile>,
    families: HashMap<UserId, BTreeSet<FamilyId>>,
    unreachable: HashSet<UserId>,
    down: bool,
}

impl Directory {
    fn check(&self, user: UserId) -> Result<(), DirectoryError> {
        if self.down || self.unreachable.contains(&user) {
            return Err(DirectoryError::Unavailable(format!("user {user} unreachable")));
        }
        if !self.profiles.contains_key(&user) {
            return Err(DirectoryError::UserNotFound(user));
        }
        Ok(())
    }
}

/// In-memory identity directory.
///
/// Intended for tests/dev. Failures can be injected per user or globally to
/// exercise the partial-success paths.
#[derive(Debug, Default)]
pub struct InMemoryIdentityDirectory {
    inner: RwLock<Directory>,
}

impl InMemoryIdentityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a minimal profile for `user_id`.
    pub fn register_user(&self, user_id: UserId, email: impl Into<String>) {
        self.register(UserProfile {
            user_id,
            email: email.into(),
            phone_number: String::new(),
            name: String::new(),
            surname: String::new(),
            registered_at: Utc::now(),
        });
    }

    pub fn register(&self, profile: UserProfile) {
        if let Ok(mut dir) = self.inner.write() {
            dir.profiles.insert(profile.user_id, profile);
        }
    }

    /// Families currently attached to `user_id`'s record.
    pub fn families_of(&self, user_id: UserId) -> Vec<FamilyId> {
        self.inner
            .read()
            .map(|dir| {
                dir.families
                    .get(&user_id)
                    .map(|f| f.iter().copied().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Make every call touching `user_id` fail as unavailable.
    pub fn make_unreachable(&self, user_id: UserId) {
        if let Ok(mut dir) = self.inner.write() {
            dir.unreachable.insert(user_id);
        }
    }

    pub fn make_reachable(&self, user_id: UserId) {
        if let Ok(mut dir) = self.inner.write() {
            dir.unreachable.remove(&user_id);
        }
    }

    /// Take the whole directory down (or bring it back).
    pub fn set_down(&self, down: bool) {
        if let Ok(mut dir) = self.inner.write() {
            dir.down = down;
        }
    }
}

fn poisoned() -> DirectoryError {
    DirectoryError::Unavailable("lock poisoned".to_string())
}

#[async_trait]
impl IdentityDirectory for InMemoryIdentityDirectory {
    async fn resolve_user(&self, user: UserId) -> Result<UserProfile, DirectoryError> {
        let dir = self.inner.read().map_err(|_| poisoned())?;
        dir.check(user)?;
        dir.profiles
            .get(&user)
            .cloned()
            .ok_or(DirectoryError::UserNotFound(user))
    }

    async fn attach_family(&self, user: UserId, family: FamilyId) -> Result<(), DirectoryError> {
        let mut dir = self.inner.write().map_err(|_| poisoned())?;
        dir.check(user)?;
        dir.families.entry(user).or_default().insert(family);
        Ok(())
    }

    async fn detach_family(&self, user: UserId, family: FamilyId) -> Result<(), DirectoryError> {
        let mut dir = self.inner.write().map_err(|_| poisoned())?;
        dir.check(user)?;
        if let Some(families) = dir.families.get_mut(&user) {
            families.remove(&family);
        }
        Ok(())
    }
}

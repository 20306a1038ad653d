//! Per-method role policy.
//!
//! The table is immutable once built and must cover the registered method set
//! exactly: a registered method without an entry, or an entry for a method
//! nobody registered, is a startup error.

use std::collections::{BTreeSet, HashMap, HashSet};

use thiserror::Error;

use crate::Role;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("duplicate policy entry for method '{0}'")]
    DuplicateEntry(String),

    #[error("policy entry for method '{0}' allows no roles")]
    EmptyEntry(String),

    #[error("policy does not match registered methods (missing: {missing:?}, stray: {stray:?})")]
    Coverage {
        missing: Vec<String>,
        stray: Vec<String>,
    },
}

/// Static method → allowed-roles table. Methods without an entry are denied.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    entries: HashMap<String, HashSet<Role>>,
}

impl AccessPolicy {
    pub fn builder() -> AccessPolicyBuilder {
        AccessPolicyBuilder::default()
    }

    /// Roles allowed to call `method`, or `None` if the method is unlisted.
    pub fn allowed_roles(&self, method: &str) -> Option<&HashSet<Role>> {
        self.entries.get(method)
    }

    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Check that the table covers exactly the `registered` method set.
    pub fn validate<'a>(&self, registered: impl IntoIterator<Item = &'a str>) -> Result<(), PolicyError> {
        let registered: BTreeSet<&str> = registered.into_iter().collect();
        let listed: BTreeSet<&str> = self.methods().collect();

        let missing: Vec<String> = registered.difference(&listed).map(|m| m.to_string()).collect();
        let stray: Vec<String> = listed.difference(&registered).map(|m| m.to_string()).collect();

        if missing.is_empty() && stray.is_empty() {
            Ok(())
        } else {
            Err(PolicyError::Coverage { missing, stray })
        }
    }
}

#[derive(Debug, Default)]
pub struct AccessPolicyBuilder {
    entries: Vec<(String, HashSet<Role>)>,
}

impl AccessPolicyBuilder {
    pub fn allow(mut self, method: impl Into<String>, roles: &[Role]) -> Self {
        self.entries.push((method.into(), roles.iter().copied().collect()));
        self
    }

    pub fn build(self) -> Result<AccessPolicy, PolicyError> {
        let mut entries = HashMap::with_capacity(self.entries.len());
        for (method, roles) in self.entries {
            if roles.is_empty() {
                return Err(PolicyError::EmptyEntry(method));
            }
            if entries.contains_key(&method) {
                return Err(PolicyError::DuplicateEntry(method));
            }
            entries.insert(method, roles);
        }
        Ok(AccessPolicy { entries })
    }
}

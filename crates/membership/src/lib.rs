//! `kinship-membership`: membership orchestration core.
//!
//! Services enforce business invariants against the stores, commit the local
//! mutation, and only then push the change to the identity directory. A
//! directory failure after a committed mutation is reported alongside the
//! result; it never reverts local state.
//!
//! Services depend on the capability traits in [`ports`] only.

pub mod family;
pub mod invite;
pub mod leadership;
pub mod ports;
pub mod sync;

pub use family::{FamilyService, MembershipConfig};
pub use invite::InviteService;
pub use leadership::{FamilyDeletion, LeadershipService};
pub use ports::{DirectoryError, FamilyStore, IdentityDirectory, InviteStore};
pub use sync::{SyncError, SyncFailure, Synced};

//! `kinship-core`: membership domain building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the family/invite records and their invariants, and the error
//! taxonomy every boundary maps onto.

pub mod error;
pub mod family;
pub mod id;
pub mod invite;
pub mod profile;

pub use error::{DomainError, DomainResult, ErrorKind};
pub use family::{Family, MemberRemoval};
pub use id::{FamilyId, InviteId, UserId};
pub use invite::Invite;
pub use profile::UserProfile;

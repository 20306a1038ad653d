//! Family + invite persistence adapters.
//!
//! Each adapter implements both `FamilyStore` and `InviteStore`; the services
//! hold them through the separate trait objects.

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryMembershipStore;
pub use postgres::PostgresMembershipStore;

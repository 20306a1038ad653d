//! Infrastructure layer: storage adapters and the identity directory clients.

pub mod directory;
pub mod store;

pub use directory::{HttpDirectoryConfig, HttpIdentityDirectory, InMemoryIdentityDirectory};
pub use store::{InMemoryMembershipStore, PostgresMembershipStore};

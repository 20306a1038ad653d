//! Identity directory adapters.

pub mod http;
pub mod in_memory;

pub use http::{HttpDirectoryConfig, HttpIdentityDirectory};
pub use in_memory::InMemoryIdentityDirectory;

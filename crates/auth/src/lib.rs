//! `kinship-auth`: pure authentication/authorization boundary (default-deny).
//!
//! This crate is intentionally decoupled from HTTP and storage: the gateway
//! takes a method identifier plus the raw `authorization` metadata value and
//! either produces a [`Principal`] or a rejection.

pub mod claims;
pub mod gateway;
pub mod policy;
pub mod principal;
pub mod role;
pub mod token;

pub use claims::Claims;
pub use gateway::{AuthGateway, GatewayError};
pub use policy::{AccessPolicy, PolicyError};
pub use principal::Principal;
pub use role::Role;
pub use token::{TokenError, TokenManager};

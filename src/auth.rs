//! Identifiers, scopes, principals, request parameters, and token values.

pub mod id;
pub mod params;
pub mod principal;
pub mod scope;
pub mod token;

pub use id::*;
pub use params::*;
pub use principal::*;
pub use scope::*;
pub use token::{jwt::unverified_expiry, record::*, secret::*};

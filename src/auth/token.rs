//! Token values returned by the managers.

pub mod jwt;
pub mod record;
pub mod secret;

//! Token lifecycle managers.
//!
//! [`ClientTokenManager`] serves client-credentials tokens from the cache and coalesces
//! misses per client name. [`UserTokenManager`] reads user tokens from the session store,
//! decides when they are due for renewal, and coalesces refreshes per refresh token.
//! Neither surfaces failures as `Err`: callers inspect [`Token::error`](crate::auth::Token).

pub mod client;
pub mod user;

pub use client::*;
pub use user::*;

//! Provider descriptors and the client registry that selects between them.
//!
//! `descriptor` exposes validated metadata ([`ProviderDescriptor`]) covering the token
//! endpoint, supported grant flags, client authentication preferences, and the scope
//! delimiter quirk. `registry` binds descriptors to client credentials and resolves the
//! registration a token request targets.

pub mod descriptor;
pub mod registry;

pub use descriptor::*;
pub use registry::*;

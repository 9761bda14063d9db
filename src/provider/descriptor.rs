//! Provider descriptor data structures.
//!
//! A descriptor captures what the token endpoint client needs to talk to one
//! authorization server: where the token endpoint lives, which grants it accepts,
//! how the client authenticates, and a few formatting quirks.

/// Builder API for assembling provider descriptors.
pub mod builder;
/// Grant helpers wired into provider descriptors.
pub mod grant;
/// Provider-specific quirk toggles.
pub mod quirks;

pub use builder::*;
pub use grant::*;
pub use quirks::*;

// self
use crate::{_prelude::*, auth::ProviderId};

/// Client authentication modes for token endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
	/// Public client: only `client_id` is sent.
	None,
}

/// Immutable provider descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Descriptor identifier; matched against `provider_name` selectors.
	pub id: ProviderId,
	/// Issuer identifier; matched against `issuer` selectors.
	pub issuer: Option<Url>,
	/// Token endpoint used for both grants.
	pub token_endpoint: Url,
	/// Supported grant flags.
	pub supported_grants: SupportedGrants,
	/// Client authentication mechanism.
	pub client_auth_method: ClientAuthMethod,
	/// Provider-specific quirks.
	#[serde(default)]
	pub quirks: ProviderQuirks,
}
impl ProviderDescriptor {
	/// Creates a new builder for the provided identifier.
	pub fn builder(id: ProviderId) -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::new(id)
	}

	/// Checks whether the descriptor supports a given grant.
	pub fn supports(&self, grant: GrantType) -> bool {
		self.supported_grants.supports(grant)
	}
}

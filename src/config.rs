//! Typed option sets for the managers and the outbound interceptor.
//!
//! Every struct implements [`Default`] and deserializes with `#[serde(default)]`, so a
//! host application can embed them in its own configuration file and only spell out the
//! values it wants to change. Durations are expressed in whole seconds.

// self
use crate::{
	_prelude::*,
	auth::{TokenRequestParameters, TokenSecret},
};

/// Default prefix for client token cache keys.
pub const DEFAULT_CACHE_KEY_PREFIX: &str = "oauth2_token_manager::cache::";
/// Default safety buffer subtracted from a token's expiry before it is cached.
pub const DEFAULT_CACHE_LIFETIME_BUFFER: Duration = Duration::seconds(60);
/// Default window before expiry in which a user token is refreshed.
pub const DEFAULT_REFRESH_BEFORE_EXPIRATION: Duration = Duration::minutes(1);

/// Options for client-credentials token management.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientTokenOptions {
	/// Prefix prepended to every cache key.
	pub cache_key_prefix: String,
	/// Time subtracted from the token expiry when computing the cache expiration.
	#[serde(with = "seconds")]
	pub cache_lifetime_buffer: Duration,
	/// Parameters used when a caller supplies none.
	pub default_parameters: Option<TokenRequestParameters>,
}
impl ClientTokenOptions {
	/// Overrides the cache key prefix.
	pub fn with_cache_key_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.cache_key_prefix = prefix.into();

		self
	}

	/// Overrides the cache lifetime buffer.
	pub fn with_cache_lifetime_buffer(mut self, buffer: Duration) -> Self {
		self.cache_lifetime_buffer = buffer;

		self
	}

	/// Sets the parameters used when a caller supplies none.
	pub fn with_default_parameters(mut self, parameters: TokenRequestParameters) -> Self {
		self.default_parameters = Some(parameters);

		self
	}
}
impl Default for ClientTokenOptions {
	fn default() -> Self {
		Self {
			cache_key_prefix: DEFAULT_CACHE_KEY_PREFIX.into(),
			cache_lifetime_buffer: DEFAULT_CACHE_LIFETIME_BUFFER,
			default_parameters: None,
		}
	}
}

/// Options for user token management.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserTokenOptions {
	/// Window before expiry in which a refresh is triggered.
	#[serde(with = "seconds")]
	pub refresh_before_expiration: Duration,
	/// Stores and reads session token entries suffixed with the challenge scheme.
	pub scheme_scoped_tokens: bool,
	/// Base64-encoded symmetric key that opens encrypted (JWE) access tokens when their
	/// `exp` claim is the only expiry available.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub token_decryption_key: Option<TokenSecret>,
}
impl UserTokenOptions {
	/// Overrides the refresh window.
	pub fn with_refresh_before_expiration(mut self, window: Duration) -> Self {
		self.refresh_before_expiration = window;

		self
	}

	/// Enables or disables scheme-scoped session entries.
	pub fn with_scheme_scoped_tokens(mut self, enabled: bool) -> Self {
		self.scheme_scoped_tokens = enabled;

		self
	}

	/// Sets the base64-encoded key used to read the expiry of encrypted access tokens.
	pub fn with_token_decryption_key(mut self, key: impl Into<String>) -> Self {
		self.token_decryption_key = Some(TokenSecret::new(key));

		self
	}
}
impl Default for UserTokenOptions {
	fn default() -> Self {
		Self {
			refresh_before_expiration: DEFAULT_REFRESH_BEFORE_EXPIRATION,
			scheme_scoped_tokens: false,
			token_decryption_key: None,
		}
	}
}

/// Options for the outbound request interceptor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagementOptions {
	/// Raise [`UnauthorizedError`](crate::error::UnauthorizedError) when the forced retry
	/// is still rejected with `401` instead of returning the response.
	pub escalate_unauthorized: bool,
}
impl ManagementOptions {
	/// Enables or disables escalation of a second `401`.
	pub fn with_escalate_unauthorized(mut self, enabled: bool) -> Self {
		self.escalate_unauthorized = enabled;

		self
	}
}

mod seconds {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	pub(super) fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(value.whole_seconds())
	}

	pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		i64::deserialize(deserializer).map(Duration::seconds)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn defaults_match_documented_values() {
		let client = ClientTokenOptions::default();
		let user = UserTokenOptions::default();

		assert_eq!(client.cache_key_prefix, DEFAULT_CACHE_KEY_PREFIX);
		assert_eq!(client.cache_lifetime_buffer, Duration::seconds(60));
		assert!(client.default_parameters.is_none());
		assert_eq!(user.refresh_before_expiration, Duration::minutes(1));
		assert!(!user.scheme_scoped_tokens);
		assert!(user.token_decryption_key.is_none());
		assert!(!ManagementOptions::default().escalate_unauthorized);
	}

	#[test]
	fn partial_json_keeps_defaults() {
		let client: ClientTokenOptions =
			serde_json::from_str("{\"cache_lifetime_buffer\":30}")
				.expect("Partial client options should deserialize.");

		assert_eq!(client.cache_lifetime_buffer, Duration::seconds(30));
		assert_eq!(client.cache_key_prefix, DEFAULT_CACHE_KEY_PREFIX);

		let user: UserTokenOptions =
			serde_json::from_str("{\"scheme_scoped_tokens\":true,\"refresh_before_expiration\":120}")
				.expect("User options should deserialize.");

		assert_eq!(user.refresh_before_expiration, Duration::minutes(2));
		assert!(user.scheme_scoped_tokens);

		let keyed: UserTokenOptions = serde_json::from_str("{\"token_decryption_key\":\"a2V5\"}")
			.expect("User options with a decryption key should deserialize.");

		assert_eq!(keyed, UserTokenOptions::default().with_token_decryption_key("a2V5"));

		let management: ManagementOptions = serde_json::from_str("{}")
			.expect("Empty management options should deserialize.");

		assert_eq!(management, ManagementOptions::default());
	}
}

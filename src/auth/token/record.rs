//! Client and user token values plus their builder.

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret, error::TokenError};

/// Canonical authorization scheme for bearer tokens.
pub const BEARER: &str = "Bearer";

/// Errors produced by [`TokenBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenBuildError {
	/// Issued when the access token value is empty or whitespace.
	#[error("Access token is required.")]
	MissingAccessToken,
}

/// Result of one acquisition attempt: either a usable access token or an error.
///
/// `expires_at == None` means the issuer reported no lifetime and the token is treated
/// as never expiring.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
	/// Access token secret; absent on error results.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub access_token: Option<TokenSecret>,
	/// Token type reported by the issuer, e.g. `Bearer` or `DPoP`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token_type: Option<String>,
	/// Absolute expiry instant.
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub expires_at: Option<OffsetDateTime>,
	/// Scope string granted by the issuer.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scope: Option<String>,
	/// Failure that replaced the access token.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<TokenError>,
}
impl Token {
	/// Starts building a successful token.
	pub fn builder(access_token: impl Into<String>) -> TokenBuilder {
		TokenBuilder::new(access_token)
	}

	/// Creates an error result.
	pub fn failed(error: TokenError) -> Self {
		Self { access_token: None, token_type: None, expires_at: None, scope: None, error: Some(error) }
	}

	/// Whether this value carries an error.
	pub fn is_error(&self) -> bool {
		self.error.is_some()
	}

	/// Non-blank access token, if any.
	pub fn access_token(&self) -> Option<&str> {
		self.access_token.as_ref().map(TokenSecret::expose).filter(|value| !value.trim().is_empty())
	}

	/// Whether the issuer reported no lifetime.
	pub fn never_expires(&self) -> bool {
		self.expires_at.is_none()
	}

	/// Scheme used in the `Authorization` header for this token.
	pub fn authorization_scheme(&self) -> &str {
		authorization_scheme(self.token_type.as_deref())
	}
}

/// Builder for successful [`Token`] values.
#[derive(Clone, Debug)]
pub struct TokenBuilder {
	access_token: TokenSecret,
	token_type: Option<String>,
	expires_at: Option<OffsetDateTime>,
	scope: Option<String>,
}
impl TokenBuilder {
	fn new(access_token: impl Into<String>) -> Self {
		Self { access_token: TokenSecret::new(access_token), token_type: None, expires_at: None, scope: None }
	}

	/// Sets the token type.
	pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = Some(token_type.into());

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets the expiry relative to `issued_at`.
	pub fn expires_in(self, issued_at: OffsetDateTime, lifetime: Duration) -> Self {
		self.expires_at(issued_at + lifetime)
	}

	/// Sets the granted scope string.
	pub fn scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = Some(scope.into());

		self
	}

	/// Validates and produces the token.
	pub fn build(self) -> Result<Token, TokenBuildError> {
		if self.access_token.expose().trim().is_empty() {
			return Err(TokenBuildError::MissingAccessToken);
		}

		Ok(Token {
			access_token: Some(self.access_token),
			token_type: self.token_type,
			expires_at: self.expires_at,
			scope: self.scope,
			error: None,
		})
	}
}

/// A [`Token`] obtained on behalf of a user, plus the refresh token that renews it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserToken {
	/// Access token half.
	#[serde(flatten)]
	pub token: Token,
	/// Refresh token secret.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
}
impl UserToken {
	/// Pairs a token with an optional refresh token.
	pub fn new(token: Token, refresh_token: Option<TokenSecret>) -> Self {
		Self { token, refresh_token }
	}

	/// Creates an error result.
	pub fn failed(error: TokenError) -> Self {
		Self { token: Token::failed(error), refresh_token: None }
	}

	/// Whether this value carries an error.
	pub fn is_error(&self) -> bool {
		self.token.is_error()
	}

	/// Non-blank refresh token, if any.
	pub fn refresh_token(&self) -> Option<&str> {
		self.refresh_token.as_ref().map(TokenSecret::expose).filter(|value| !value.trim().is_empty())
	}
}
impl From<UserToken> for Token {
	fn from(value: UserToken) -> Self {
		value.token
	}
}

/// Resolves the `Authorization` scheme for a reported token type.
///
/// Any casing of `bearer` becomes exactly [`BEARER`], a missing or blank type defaults
/// to [`BEARER`], and every other type is used verbatim.
pub fn authorization_scheme(token_type: Option<&str>) -> &str {
	match token_type.map(str::trim).filter(|value| !value.is_empty()) {
		Some(value) if value.eq_ignore_ascii_case(BEARER) => BEARER,
		Some(value) => value,
		None => BEARER,
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn builder_rejects_blank_access_tokens() {
		assert_eq!(Token::builder("  ").build(), Err(TokenBuildError::MissingAccessToken));

		let token = Token::builder("abc")
			.token_type("bearer")
			.expires_in(macros::datetime!(2025-01-01 00:00 UTC), Duration::hours(1))
			.scope("api.read")
			.build()
			.expect("Token builder should succeed for a non-blank access token.");

		assert_eq!(token.access_token(), Some("abc"));
		assert_eq!(token.expires_at, Some(macros::datetime!(2025-01-01 01:00 UTC)));
		assert!(!token.is_error());
		assert!(!token.never_expires());
	}

	#[test]
	fn failed_tokens_carry_no_secret() {
		let token = Token::failed(TokenError::NoActiveUser);

		assert!(token.is_error());
		assert_eq!(token.access_token(), None);

		let user = UserToken::failed(TokenError::NoRefreshToken);

		assert!(user.is_error());
		assert_eq!(user.refresh_token(), None);
	}

	#[test]
	fn scheme_normalization() {
		assert_eq!(authorization_scheme(Some("bearer")), "Bearer");
		assert_eq!(authorization_scheme(Some("BEARER")), "Bearer");
		assert_eq!(authorization_scheme(Some("DPoP")), "DPoP");
		assert_eq!(authorization_scheme(Some("")), "Bearer");
		assert_eq!(authorization_scheme(None), "Bearer");
	}

	#[test]
	fn json_shape_is_stable() {
		let user = UserToken::new(
			Token::builder("access")
				.token_type("Bearer")
				.expires_at(macros::datetime!(2025-01-01 01:00 UTC))
				.build()
				.expect("Token fixture should be valid."),
			Some(TokenSecret::new("refresh")),
		);
		let payload = serde_json::to_value(&user).expect("UserToken should serialize.");

		assert_eq!(payload["access_token"], "access");
		assert_eq!(payload["refresh_token"], "refresh");
		assert_eq!(payload["expires_at"], "2025-01-01T01:00:00Z");

		let back: UserToken = serde_json::from_value(payload).expect("UserToken should deserialize.");

		assert_eq!(back, user);

		let never: Token = serde_json::from_str("{\"access_token\":\"x\"}")
			.expect("Token without expiry should deserialize.");

		assert!(never.never_expires());
	}
}

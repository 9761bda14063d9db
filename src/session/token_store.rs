//! User token persistence on top of a [`SessionStore`].

// crates.io
use time::format_description::well_known::Rfc3339;
// self
use crate::{
	_prelude::*,
	auth::{Token, TokenSecret, UserToken, UserTokenRequestParameters, unverified_expiry},
	config::UserTokenOptions,
	session::{AuthenticationTicket, RequestContext, SessionError, SessionFuture, SessionStore},
};

/// Prefix of every token entry in a ticket's items.
pub const TOKEN_PREFIX: &str = ".Token.";
/// Item listing the stored token names, `;`-separated, without [`TOKEN_PREFIX`].
pub const TOKEN_NAMES_KEY: &str = ".TokenNames";
/// Access token entry name.
pub const ACCESS_TOKEN_NAME: &str = "access_token";
/// Token type entry name.
pub const TOKEN_TYPE_NAME: &str = "token_type";
/// Refresh token entry name.
pub const REFRESH_TOKEN_NAME: &str = "refresh_token";
/// Expiry entry name; the value is RFC 3339.
pub const EXPIRES_AT_NAME: &str = "expires_at";

/// Store contract consumed by [`UserTokenManager`](crate::manager::UserTokenManager).
pub trait UserTokenStore
where
	Self: Send + Sync,
{
	/// Reads the current user token.
	fn get_token<'a>(
		&'a self,
		ctx: &'a RequestContext,
		params: &'a UserTokenRequestParameters,
	) -> SessionFuture<'a, UserToken>;

	/// Persists a freshly obtained user token.
	fn store_token<'a>(
		&'a self,
		ctx: &'a RequestContext,
		token: &'a UserToken,
		params: &'a UserTokenRequestParameters,
	) -> SessionFuture<'a, ()>;

	/// Forgets the user token.
	fn clear_token<'a>(
		&'a self,
		ctx: &'a RequestContext,
		params: &'a UserTokenRequestParameters,
	) -> SessionFuture<'a, ()>;
}

/// [`UserTokenStore`] that keeps tokens as `.Token.*` items on the session ticket.
///
/// With [`UserTokenOptions::scheme_scoped_tokens`] enabled and a challenge scheme in
/// the request, entries are named `.Token.<name>||<challenge scheme>`; reads fall back
/// to the unscoped name for each entry. When no expiry entry exists the `exp` claim of
/// a JWT access token is used, and otherwise the token never expires.
///
/// [`clear_token`](UserTokenStore::clear_token) is a no-op: the tokens disappear with the
/// session at sign-out.
pub struct SessionTokenStore<S>
where
	S: ?Sized + SessionStore,
{
	sessions: Arc<S>,
	options: UserTokenOptions,
}
impl<S> SessionTokenStore<S>
where
	S: ?Sized + SessionStore,
{
	/// Wraps `sessions` with default options.
	pub fn new(sessions: Arc<S>) -> Self {
		Self { sessions, options: UserTokenOptions::default() }
	}

	/// Overrides the options.
	pub fn with_options(mut self, options: UserTokenOptions) -> Self {
		self.options = options;

		self
	}

	fn scope_suffix<'p>(&self, params: &'p UserTokenRequestParameters) -> Option<&'p str> {
		if !self.options.scheme_scoped_tokens {
			return None;
		}

		params.challenge_scheme.as_deref().filter(|scheme| !scheme.is_empty())
	}

	async fn ticket(
		&self,
		ctx: &RequestContext,
		scheme: Option<&str>,
	) -> Result<AuthenticationTicket, SessionError> {
		if let Some(ticket) = ctx.cached_ticket(scheme) {
			return Ok(ticket);
		}

		let ticket = self.sessions.authenticate(ctx.principal(), scheme).await?.ok_or_else(|| {
			SessionError::CannotAuthenticate { scheme: scheme.unwrap_or_default().to_owned() }
		})?;

		ctx.cache_ticket(scheme, ticket.clone());

		Ok(ticket)
	}
}
impl<S> UserTokenStore for SessionTokenStore<S>
where
	S: ?Sized + SessionStore,
{
	fn get_token<'a>(
		&'a self,
		ctx: &'a RequestContext,
		params: &'a UserTokenRequestParameters,
	) -> SessionFuture<'a, UserToken> {
		Box::pin(async move {
			let scheme = params.sign_in_scheme.as_deref();
			let ticket = self.ticket(ctx, scheme).await?;
			let items = &ticket.properties.items;

			if !items.keys().any(|name| name.starts_with(TOKEN_PREFIX)) {
				return Err(SessionError::NoTokens);
			}

			let suffix = self.scope_suffix(params);
			let lookup = |name: &str, suffix: Option<&str>| {
				items
					.get(&entry_name(name, suffix))
					.map(String::as_str)
					.filter(|value| !value.trim().is_empty())
			};
			let read = |name: &str| {
				suffix.and_then(|suffix| lookup(name, Some(suffix))).or_else(|| lookup(name, None))
			};
			let access_token = read(ACCESS_TOKEN_NAME);
			// A scoped access token never inherits the unscoped expiry.
			let raw_expiry = match suffix {
				Some(suffix) if lookup(ACCESS_TOKEN_NAME, Some(suffix)).is_some() =>
					lookup(EXPIRES_AT_NAME, Some(suffix)),
				_ => read(EXPIRES_AT_NAME),
			};
			let stored_expiry = raw_expiry.and_then(|raw| {
				OffsetDateTime::parse(raw, &Rfc3339)
					.inspect_err(|e| {
						tracing::warn!(error = %e, "Ignoring unparsable session token expiry.")
					})
					.ok()
			});
			let expires_at = stored_expiry.or_else(|| {
				access_token.and_then(|access_token| {
					unverified_expiry(access_token, self.options.token_decryption_key.as_ref())
				})
			});
			let token = Token {
				access_token: access_token.map(TokenSecret::new),
				token_type: read(TOKEN_TYPE_NAME).map(ToOwned::to_owned),
				expires_at,
				scope: None,
				error: None,
			};

			Ok(UserToken::new(token, read(REFRESH_TOKEN_NAME).map(TokenSecret::new)))
		})
	}

	fn store_token<'a>(
		&'a self,
		ctx: &'a RequestContext,
		token: &'a UserToken,
		params: &'a UserTokenRequestParameters,
	) -> SessionFuture<'a, ()> {
		Box::pin(async move {
			let principal = ctx.principal();

			if !principal.is_authenticated() {
				return Err(SessionError::Anonymous);
			}

			let scheme = params.sign_in_scheme.as_deref();
			let suffix = self.scope_suffix(params);
			let mut ticket = self.ticket(ctx, scheme).await?;
			let items = &mut ticket.properties.items;

			if let Some(access_token) = token.token.access_token() {
				items.insert(entry_name(ACCESS_TOKEN_NAME, suffix), access_token.to_owned());
			}
			if let Some(token_type) = &token.token.token_type {
				items.insert(entry_name(TOKEN_TYPE_NAME, suffix), token_type.clone());
			}
			if let Some(refresh_token) = token.refresh_token() {
				items.insert(entry_name(REFRESH_TOKEN_NAME, suffix), refresh_token.to_owned());
			}

			match token.token.expires_at {
				Some(expires_at) => {
					let formatted = expires_at
						.format(&Rfc3339)
						.map_err(|e| SessionError::Backend { message: e.to_string() })?;

					items.insert(entry_name(EXPIRES_AT_NAME, suffix), formatted);
				},
				None => {
					items.remove(&entry_name(EXPIRES_AT_NAME, suffix));
				},
			}

			let names = items
				.keys()
				.filter_map(|name| name.strip_prefix(TOKEN_PREFIX))
				.collect::<Vec<_>>()
				.join(";");

			items.insert(TOKEN_NAMES_KEY.to_owned(), names);

			let allow_refresh = ticket
				.properties
				.allow_refresh
				.unwrap_or_else(|| self.sessions.sliding_expiration(scheme));

			if allow_refresh {
				// Let the session issuer stamp a fresh lifetime on re-issue.
				ticket.properties.issued_at = None;
				ticket.properties.expires_at = None;
			}

			self.sessions.sign_in(principal, scheme, ticket.clone()).await?;
			ctx.cache_ticket(scheme, ticket);

			tracing::debug!(user = principal.display_name(), "Stored user token in session.");

			Ok(())
		})
	}

	fn clear_token<'a>(
		&'a self,
		_ctx: &'a RequestContext,
		_params: &'a UserTokenRequestParameters,
	) -> SessionFuture<'a, ()> {
		Box::pin(async { Ok(()) })
	}
}

fn entry_name(name: &str, suffix: Option<&str>) -> String {
	match suffix {
		Some(scheme) => format!("{TOKEN_PREFIX}{name}||{scheme}"),
		None => format!("{TOKEN_PREFIX}{name}"),
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use aes_gcm::{
		Aes256Gcm, Nonce,
		aead::{Aead, KeyInit, Payload},
	};
	use base64::{
		Engine as _,
		engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
	};
	use time::macros;
	// self
	use super::*;
	use crate::{auth::Principal, session::MemorySessionStore};

	const SUBJECT: &str = "user-1";

	fn seeded(items: &[(&str, &str)]) -> (Arc<MemorySessionStore>, RequestContext) {
		let sessions = Arc::new(MemorySessionStore::default());
		let principal = Principal::authenticated(SUBJECT);
		let mut ticket = AuthenticationTicket::new(principal.clone(), "");

		for (name, value) in items {
			ticket = ticket.with_item(*name, *value);
		}

		ticket.properties.issued_at = Some(macros::datetime!(2025-01-01 00:00 UTC));
		ticket.properties.expires_at = Some(macros::datetime!(2025-01-01 08:00 UTC));
		sessions.insert(ticket).expect("Seeding a session ticket should succeed.");

		(sessions, RequestContext::new(principal))
	}

	fn sample_token() -> UserToken {
		UserToken::new(
			Token::builder("new-access").build().expect("Token fixture should be valid."),
			Some(TokenSecret::new("new-refresh")),
		)
	}

	fn store(sessions: &Arc<MemorySessionStore>) -> SessionTokenStore<MemorySessionStore> {
		SessionTokenStore::new(sessions.clone())
	}

	#[tokio::test]
	async fn reads_entries_and_caches_ticket_per_request() {
		let (sessions, ctx) = seeded(&[
			(".Token.access_token", "access-1"),
			(".Token.token_type", "bearer"),
			(".Token.refresh_token", "refresh-1"),
			(".Token.expires_at", "2025-01-01T01:00:00Z"),
		]);
		let store = store(&sessions);
		let params = UserTokenRequestParameters::default();
		let token = store.get_token(&ctx, &params).await.expect("Reading tokens should succeed.");

		assert_eq!(token.token.access_token(), Some("access-1"));
		assert_eq!(token.token.token_type.as_deref(), Some("bearer"));
		assert_eq!(token.refresh_token(), Some("refresh-1"));
		assert_eq!(token.token.expires_at, Some(macros::datetime!(2025-01-01 01:00 UTC)));

		store.get_token(&ctx, &params).await.expect("Second read should succeed.");

		assert_eq!(sessions.authentications(), 1, "Second read must hit the request cache.");
	}

	#[tokio::test]
	async fn expiry_falls_back_to_jwt_then_never() {
		let jwt = format!(
			"eyJhbGciOiJub25lIn0.{}.sig",
			URL_SAFE_NO_PAD.encode("{\"exp\":1735693200}")
		);
		let (sessions, ctx) = seeded(&[(".Token.access_token", &jwt)]);
		let token = store(&sessions)
			.get_token(&ctx, &UserTokenRequestParameters::default())
			.await
			.expect("Reading tokens should succeed.");

		assert_eq!(token.token.expires_at, Some(macros::datetime!(2025-01-01 01:00 UTC)));

		let (sessions, ctx) = seeded(&[(".Token.access_token", "opaque")]);
		let token = store(&sessions)
			.get_token(&ctx, &UserTokenRequestParameters::default())
			.await
			.expect("Reading tokens should succeed.");

		assert!(token.token.never_expires());
		assert_eq!(token.refresh_token(), None);
	}

	#[tokio::test]
	async fn encrypted_access_token_expiry_uses_the_configured_key() {
		let key = [5_u8; 32];
		let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"dir","enc":"A256GCM"}"#);
		let iv = [3_u8; 12];
		let sealed = Aes256Gcm::new_from_slice(&key)
			.expect("Test key should be valid.")
			.encrypt(Nonce::from_slice(&iv), Payload {
				msg: b"{\"exp\":1735693200}",
				aad: header.as_bytes(),
			})
			.expect("Test claims should encrypt.");
		let (ciphertext, tag) = sealed.split_at(sealed.len() - 16);
		let jwe = format!(
			"{header}..{}.{}.{}",
			URL_SAFE_NO_PAD.encode(iv),
			URL_SAFE_NO_PAD.encode(ciphertext),
			URL_SAFE_NO_PAD.encode(tag)
		);
		let (sessions, ctx) = seeded(&[(".Token.access_token", &jwe)]);
		let params = UserTokenRequestParameters::default();
		let unkeyed = store(&sessions).get_token(&ctx, &params).await.expect("Read should succeed.");

		assert!(unkeyed.token.never_expires());

		let keyed = store(&sessions)
			.with_options(UserTokenOptions::default().with_token_decryption_key(STANDARD.encode(key)))
			.get_token(&ctx, &params)
			.await
			.expect("Read should succeed.");

		assert_eq!(keyed.token.expires_at, Some(macros::datetime!(2025-01-01 01:00 UTC)));
	}

	#[tokio::test]
	async fn missing_session_or_tokens_are_errors() {
		let (sessions, _) = seeded(&[("other", "value")]);
		let store = store(&sessions);
		let ctx = RequestContext::new(Principal::authenticated(SUBJECT));
		let params = UserTokenRequestParameters::default();

		assert_eq!(store.get_token(&ctx, &params).await, Err(SessionError::NoTokens));

		let scoped = params.clone().with_sign_in_scheme("cookies");

		assert_eq!(
			store.get_token(&ctx, &scoped).await,
			Err(SessionError::CannotAuthenticate { scheme: "cookies".into() })
		);

		let anonymous = RequestContext::new(Principal::anonymous());

		assert_eq!(
			store.store_token(&anonymous, &sample_token(), &params).await,
			Err(SessionError::Anonymous)
		);
	}

	#[tokio::test]
	async fn scheme_scoped_entries_round_trip_with_fallback() {
		let (sessions, ctx) = seeded(&[(".Token.refresh_token", "shared-refresh")]);
		let store = store(&sessions)
			.with_options(UserTokenOptions::default().with_scheme_scoped_tokens(true));
		let params = UserTokenRequestParameters::default().with_challenge_scheme("oidc");
		let token = UserToken::new(
			Token::builder("scoped-access")
				.token_type("Bearer")
				.expires_at(macros::datetime!(2025-01-01 02:00 UTC))
				.build()
				.expect("Token fixture should be valid."),
			None,
		);

		store.store_token(&ctx, &token, &params).await.expect("Storing tokens should succeed.");

		let ticket = sessions.ticket(SUBJECT, None).expect("Ticket should be re-issued.");
		let items = &ticket.properties.items;

		assert_eq!(items.get(".Token.access_token||oidc").map(String::as_str), Some("scoped-access"));
		assert_eq!(
			items.get(".Token.expires_at||oidc").map(String::as_str),
			Some("2025-01-01T02:00:00Z")
		);
		assert!(!items.contains_key(".Token.access_token"));
		assert_eq!(
			items.get(TOKEN_NAMES_KEY).map(String::as_str),
			Some("access_token||oidc;expires_at||oidc;refresh_token;token_type||oidc")
		);

		let fresh_ctx = RequestContext::new(Principal::authenticated(SUBJECT));
		let read = store.get_token(&fresh_ctx, &params).await.expect("Scoped read should succeed.");

		assert_eq!(read.token.access_token(), Some("scoped-access"));
		assert_eq!(read.refresh_token(), Some("shared-refresh"), "Unscoped entries are the fallback.");
	}

	#[tokio::test]
	async fn scoped_never_expiring_token_ignores_unscoped_expiry() {
		let (sessions, ctx) = seeded(&[
			(".Token.access_token", "cookie-access"),
			(".Token.expires_at", "2020-01-01T00:00:00Z"),
		]);
		let store = store(&sessions)
			.with_options(UserTokenOptions::default().with_scheme_scoped_tokens(true));
		let scoped = UserTokenRequestParameters::default().with_challenge_scheme("oidc");
		let token = UserToken::new(
			Token::builder("scoped-access").build().expect("Token fixture should be valid."),
			Some(TokenSecret::new("scoped-refresh")),
		);

		store.store_token(&ctx, &token, &scoped).await.expect("Storing tokens should succeed.");

		let fresh_ctx = RequestContext::new(Principal::authenticated(SUBJECT));
		let read = store.get_token(&fresh_ctx, &scoped).await.expect("Scoped read should succeed.");

		assert_eq!(read.token.access_token(), Some("scoped-access"));
		assert!(read.token.never_expires());

		let unscoped = store
			.get_token(&fresh_ctx, &UserTokenRequestParameters::default())
			.await
			.expect("Unscoped read should succeed.");

		assert_eq!(unscoped.token.access_token(), Some("cookie-access"));
		assert_eq!(unscoped.token.expires_at, Some(macros::datetime!(2020-01-01 00:00 UTC)));
	}

	#[tokio::test]
	async fn store_resets_session_lifetime_only_when_refresh_is_allowed() {
		let token = sample_token();
		let params = UserTokenRequestParameters::default();
		let (sessions, ctx) = seeded(&[(".Token.access_token", "old")]);

		store(&sessions).store_token(&ctx, &token, &params).await.expect("Store should succeed.");

		let ticket = sessions.ticket(SUBJECT, None).expect("Ticket should exist.");

		assert!(ticket.properties.issued_at.is_some(), "Sliding expiration is off by default.");
		assert_eq!(sessions.sign_ins(), 1);

		let sliding = Arc::new(MemorySessionStore::default().with_sliding_expiration(true));
		let principal = Principal::authenticated(SUBJECT);
		let mut seeded_ticket = AuthenticationTicket::new(principal.clone(), "");

		seeded_ticket.properties.issued_at = Some(macros::datetime!(2025-01-01 00:00 UTC));
		sliding.insert(seeded_ticket).expect("Seeding should succeed.");

		let ctx = RequestContext::new(principal);

		store(&sliding).store_token(&ctx, &token, &params).await.expect("Store should succeed.");

		let ticket = sliding.ticket(SUBJECT, None).expect("Ticket should exist.");

		assert_eq!(ticket.properties.issued_at, None);
		assert_eq!(ticket.properties.expires_at, None);
		assert_eq!(
			ctx.cached_ticket(None).map(|t| t.properties.items),
			Some(ticket.properties.items),
			"The request cache sees the re-issued ticket."
		);
	}
}

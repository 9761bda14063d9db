//! Client token cache over a [`CacheStore`].
//!
//! Entries are keyed by `prefix + client + "::s_" + normalized scopes` and expire
//! `cache_lifetime_buffer` before the token itself. Parameters other than scopes do
//! not contribute to the key, so two requests for the same client and scopes that
//! differ only in, say, additional form fields share one slot.

// self
use crate::{
	_prelude::*,
	auth::{ClientName, Token, TokenRequestParameters},
	config::ClientTokenOptions,
	store::{CacheStore, StoreError, StoreFuture},
};

/// Cache contract consumed by [`ClientTokenManager`](crate::manager::ClientTokenManager).
pub trait ClientTokenCache
where
	Self: Send + Sync,
{
	/// Caches `token` for `client` under the key derived from `params`.
	fn set<'a>(
		&'a self,
		client: &'a ClientName,
		token: &'a Token,
		params: &'a TokenRequestParameters,
	) -> StoreFuture<'a, ()>;

	/// Returns the cached token, or `None` on a miss or an unreadable entry.
	fn get<'a>(
		&'a self,
		client: &'a ClientName,
		params: &'a TokenRequestParameters,
	) -> StoreFuture<'a, Option<Token>>;

	/// Removes the cached token. Missing entries are not an error.
	fn delete<'a>(
		&'a self,
		client: &'a ClientName,
		params: &'a TokenRequestParameters,
	) -> StoreFuture<'a, ()>;
}

/// [`ClientTokenCache`] that serializes tokens as JSON into any [`CacheStore`].
pub struct DistributedTokenCache<S>
where
	S: ?Sized + CacheStore,
{
	store: Arc<S>,
	options: ClientTokenOptions,
}
impl<S> DistributedTokenCache<S>
where
	S: ?Sized + CacheStore,
{
	/// Wraps `store` with default options.
	pub fn new(store: impl Into<Arc<S>>) -> Self {
		Self { store: store.into(), options: ClientTokenOptions::default() }
	}

	/// Overrides the cache options.
	pub fn with_options(mut self, options: ClientTokenOptions) -> Self {
		self.options = options;

		self
	}

	/// Key under which `client` + `params` are stored.
	pub fn key(&self, client: &ClientName, params: &TokenRequestParameters) -> String {
		cache_key(&self.options.cache_key_prefix, client, params)
	}
}
impl<S> Debug for DistributedTokenCache<S>
where
	S: ?Sized + CacheStore,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DistributedTokenCache").field("options", &self.options).finish()
	}
}
impl<S> ClientTokenCache for DistributedTokenCache<S>
where
	S: ?Sized + CacheStore,
{
	fn set<'a>(
		&'a self,
		client: &'a ClientName,
		token: &'a Token,
		params: &'a TokenRequestParameters,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let key = self.key(client, params);
			let expires_at = cache_expiration(token, self.options.cache_lifetime_buffer);
			let payload = serde_json::to_string(token)
				.map_err(|e| StoreError::Serialization { message: e.to_string() })?;

			tracing::debug!(client = %client, ?expires_at, "Caching client token.");

			self.store.set_string(&key, payload, expires_at).await
		})
	}

	fn get<'a>(
		&'a self,
		client: &'a ClientName,
		params: &'a TokenRequestParameters,
	) -> StoreFuture<'a, Option<Token>> {
		Box::pin(async move {
			let key = self.key(client, params);
			let Some(payload) = self.store.get_string(&key).await? else {
				tracing::trace!(client = %client, "Client token cache miss.");

				return Ok(None);
			};

			match serde_json::from_str::<Token>(&payload) {
				Ok(token) => {
					tracing::trace!(client = %client, "Client token cache hit.");

					Ok(Some(token))
				},
				Err(e) => {
					tracing::error!(
						client = %client,
						error = %e,
						"Cached client token could not be deserialized; treating as a miss."
					);

					Ok(None)
				},
			}
		})
	}

	fn delete<'a>(
		&'a self,
		client: &'a ClientName,
		params: &'a TokenRequestParameters,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let key = self.key(client, params);

			tracing::debug!(client = %client, "Deleting cached client token.");

			self.store.remove(&key).await
		})
	}
}

/// Builds the cache key for `client` + `params`.
pub fn cache_key(prefix: &str, client: &ClientName, params: &TokenRequestParameters) -> String {
	let scopes = params.scopes.as_ref().map(|scopes| scopes.normalized()).unwrap_or_default();

	format!("{prefix}{client}::s_{scopes}")
}

/// Absolute cache expiration for `token`: its expiry minus `buffer`, or `None` when the
/// token never expires.
///
/// An expiry too close to the range bound to apply `buffer` is used unchanged.
pub fn cache_expiration(token: &Token, buffer: Duration) -> Option<OffsetDateTime> {
	token.expires_at.map(|expires_at| expires_at.checked_sub(buffer).unwrap_or(expires_at))
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::{Date, macros};
	// self
	use super::*;
	use crate::{
		auth::ScopeSet,
		clock::ManualClock,
		config::DEFAULT_CACHE_KEY_PREFIX,
		store::MemoryCacheStore,
	};

	fn client(name: &str) -> ClientName {
		ClientName::new(name).expect("Client name fixture should be valid.")
	}

	fn token(expires_at: OffsetDateTime) -> Token {
		Token::builder("cached")
			.token_type("Bearer")
			.expires_at(expires_at)
			.build()
			.expect("Token fixture should be valid.")
	}

	#[test]
	fn key_uses_prefix_client_and_normalized_scopes() {
		let params = TokenRequestParameters::default().with_scopes(
			ScopeSet::new(["b", "a"]).expect("Scope fixture should be valid for key test."),
		);

		assert_eq!(
			cache_key("p::", &client("svc-a"), &params),
			"p::svc-a::s_a b"
		);
		assert_eq!(
			cache_key(DEFAULT_CACHE_KEY_PREFIX, &client("svc-a"), &TokenRequestParameters::default()),
			"oauth2_token_manager::cache::svc-a::s_"
		);

		let other = params.clone().with_additional_parameter("audience", "x");

		assert_eq!(cache_key("p::", &client("svc-a"), &other), cache_key("p::", &client("svc-a"), &params));
	}

	#[tokio::test]
	async fn expiration_is_token_expiry_minus_buffer() {
		let expires_at = macros::datetime!(2025-01-01 01:00 UTC);
		let clock = ManualClock::new(expires_at - Duration::seconds(61));
		let store = Arc::new(MemoryCacheStore::with_clock(Arc::new(clock.clone())));
		let cache = <DistributedTokenCache<MemoryCacheStore>>::new(store);
		let svc = client("svc-a");
		let params = TokenRequestParameters::default();

		cache.set(&svc, &token(expires_at), &params).await.expect("Caching should succeed.");

		assert!(cache.get(&svc, &params).await.expect("Lookup should succeed.").is_some());

		clock.set(expires_at - Duration::seconds(59));

		assert!(cache.get(&svc, &params).await.expect("Lookup should succeed.").is_none());
	}

	#[tokio::test]
	async fn extreme_expiry_does_not_overflow_the_buffer() {
		let earliest = Date::MIN.midnight().assume_utc();
		let cache = <DistributedTokenCache<MemoryCacheStore>>::new(MemoryCacheStore::default());
		let svc = client("svc-a");
		let params = TokenRequestParameters::default();

		assert_eq!(cache_expiration(&token(earliest), Duration::seconds(60)), Some(earliest));

		cache.set(&svc, &token(earliest), &params).await.expect("Caching should succeed.");

		assert_eq!(cache.get(&svc, &params).await.expect("Lookup should succeed."), None);
	}

	#[tokio::test]
	async fn unreadable_entries_read_as_miss() {
		let store = Arc::new(MemoryCacheStore::default());
		let cache = <DistributedTokenCache<MemoryCacheStore>>::new(store.clone());
		let svc = client("svc-a");
		let params = TokenRequestParameters::default();

		store
			.set_string(&cache.key(&svc, &params), "{not json".into(), None)
			.await
			.expect("Seeding a corrupt entry should succeed.");

		assert_eq!(cache.get(&svc, &params).await.expect("Corrupt entries must not error."), None);
	}

	#[tokio::test]
	async fn never_expiring_tokens_are_cached_without_expiration() {
		let store = Arc::new(MemoryCacheStore::default());
		let cache = <DistributedTokenCache<dyn CacheStore>>::new(store.clone() as Arc<dyn CacheStore>);
		let svc = client("svc-a");
		let params = TokenRequestParameters::default();
		let forever = Token::builder("forever").build().expect("Token fixture should be valid.");

		assert_eq!(cache_expiration(&forever, Duration::seconds(60)), None);

		cache.set(&svc, &forever, &params).await.expect("Caching should succeed.");

		assert_eq!(cache.get(&svc, &params).await.expect("Lookup should succeed."), Some(forever));

		cache.delete(&svc, &params).await.expect("Delete should succeed.");
		cache.delete(&svc, &params).await.expect("Deleting a missing entry should succeed.");

		assert!(store.is_empty());
	}
}

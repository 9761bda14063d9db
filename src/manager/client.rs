//! Client-credentials token manager.

// self
use crate::{
	_prelude::*,
	auth::{ClientName, Token, TokenRequestParameters},
	cache::ClientTokenCache,
	config::ClientTokenOptions,
	endpoint::ClientTokenEndpoint,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::StoreError,
	sync::SingleFlight,
};

/// Cached, coalesced acquisition of client-credentials tokens.
///
/// Clones share the cache, the endpoint, and the single-flight map. Create one manager
/// per process and clone it into request handlers; separate instances do not coalesce
/// with each other.
#[derive(Clone)]
pub struct ClientTokenManager {
	cache: Arc<dyn ClientTokenCache>,
	endpoint: Arc<dyn ClientTokenEndpoint>,
	options: ClientTokenOptions,
	flights: SingleFlight<Token>,
}
impl ClientTokenManager {
	/// Creates a manager with default options.
	pub fn new(cache: Arc<dyn ClientTokenCache>, endpoint: Arc<dyn ClientTokenEndpoint>) -> Self {
		Self { cache, endpoint, options: ClientTokenOptions::default(), flights: SingleFlight::new() }
	}

	/// Overrides the options.
	pub fn with_options(mut self, options: ClientTokenOptions) -> Self {
		self.options = options;

		self
	}

	/// Options in effect.
	pub fn options(&self) -> &ClientTokenOptions {
		&self.options
	}

	/// Returns a token for `client`, from the cache when possible.
	///
	/// Without `params` the configured default parameters apply. A forced renewal skips
	/// the cache read. Misses are coalesced per client name, and only successful results
	/// are written back to the cache.
	pub async fn get_access_token(
		&self,
		client: &ClientName,
		params: Option<&TokenRequestParameters>,
	) -> Token {
		const KIND: FlowKind = FlowKind::ClientCredentials;

		let span = FlowSpan::new(KIND, "get_access_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		span.instrument(async move {
			let params = self.resolve_parameters(params);

			if !params.force_renewal {
				match self.cache.get(client, &params).await {
					Ok(Some(token)) => {
						obs::record_flow_outcome(KIND, FlowOutcome::CacheHit);

						return token;
					},
					Ok(None) => {},
					Err(e) => tracing::warn!(
						client = %client,
						error = %e,
						"Client token cache read failed; treating as a miss."
					),
				}
			}

			let token = self.acquire(client.clone(), params).await;

			if token.is_error() {
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			} else {
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
			}

			token
		})
		.await
	}

	/// Removes the cached token for `client`.
	pub async fn delete_access_token(
		&self,
		client: &ClientName,
		params: Option<&TokenRequestParameters>,
	) -> Result<(), StoreError> {
		let params = self.resolve_parameters(params);

		tracing::debug!(client = %client, "Deleting cached client token.");

		self.cache.delete(client, &params).await
	}

	fn resolve_parameters(&self, params: Option<&TokenRequestParameters>) -> TokenRequestParameters {
		params.or(self.options.default_parameters.as_ref()).cloned().unwrap_or_default()
	}

	async fn acquire(&self, client: ClientName, params: TokenRequestParameters) -> Token {
		let cache = self.cache.clone();
		let endpoint = self.endpoint.clone();
		let key = client.to_string();

		self.flights
			.synchronize(key, move || async move {
				let token = endpoint.request_token(&client, &params).await;

				if token.is_error() {
					return token;
				}
				if let Err(e) = cache.set(&client, &token, &params).await {
					tracing::warn!(client = %client, error = %e, "Caching the client token failed.");
				}

				token
			})
			.await
	}
}
impl Debug for ClientTokenManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientTokenManager")
			.field("options", &self.options)
			.field("flights", &self.flights)
			.finish()
	}
}

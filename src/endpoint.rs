//! Token endpoint client.
//!
//! [`ClientTokenEndpoint`] and [`UserTokenEndpoint`] are the seams the managers call when
//! a token has to come from the authorization server. Both are infallible at the type
//! level: failures are folded into a [`TokenError`] on the returned token so coalesced
//! waiters all observe the same value. [`OAuth2TokenEndpoint`] implements both over the
//! `oauth2` crate and a [`ClientRegistry`].

// self
use crate::{
	_prelude::*,
	auth::{
		ClientName, Token, TokenRequestParameters, UserToken, UserTokenRequestParameters,
	},
	clock::{SharedClock, SystemClock},
	error::{ConfigError, TokenError},
	http::TokenHttpClient,
	oauth::{BasicFacade, TransportErrorMapper},
	provider::{ClientRegistration, ClientRegistry, GrantType},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

/// Boxed future returned by endpoint and token source methods.
pub type EndpointFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a + Send>>;

/// Performs the client-credentials grant for a named client.
pub trait ClientTokenEndpoint
where
	Self: Send + Sync,
{
	/// Requests a new token; failures come back as an error token.
	fn request_token<'a>(
		&'a self,
		client: &'a ClientName,
		params: &'a TokenRequestParameters,
	) -> EndpointFuture<'a, Token>;
}

/// Performs the refresh-token grant for a user token.
pub trait UserTokenEndpoint
where
	Self: Send + Sync,
{
	/// Redeems the refresh token carried by `token`; failures come back as an error token.
	fn refresh_token<'a>(
		&'a self,
		token: &'a UserToken,
		params: &'a UserTokenRequestParameters,
	) -> EndpointFuture<'a, UserToken>;
}

/// `oauth2`-backed implementation of both endpoint traits.
pub struct OAuth2TokenEndpoint<C, M>
where
	C: TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	registry: Arc<ClientRegistry>,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
	clock: SharedClock,
}
impl<C, M> OAuth2TokenEndpoint<C, M>
where
	C: TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an endpoint over `registry` using the supplied transport.
	pub fn new(
		registry: impl Into<Arc<ClientRegistry>>,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			registry: registry.into(),
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
			clock: Arc::new(SystemClock),
		}
	}

	/// Overrides the clock used to turn `expires_in` into an instant.
	pub fn with_clock(mut self, clock: SharedClock) -> Self {
		self.clock = clock;

		self
	}

	/// Registry used to resolve registrations.
	pub fn registry(&self) -> &ClientRegistry {
		&self.registry
	}

	fn facade(&self, registration: &ClientRegistration, grant: GrantType) -> Result<BasicFacade<C, M>> {
		if !registration.descriptor.supports(grant) {
			return Err(ConfigError::UnsupportedGrant {
				descriptor: registration.descriptor.id.to_string(),
				grant: grant.as_str(),
			}
			.into());
		}

		BasicFacade::from_registration(registration, self.http_client.clone(), self.error_mapper.clone())
	}

	async fn exchange_client_credentials(
		&self,
		client: &ClientName,
		params: &TokenRequestParameters,
	) -> Result<Token> {
		let registration = self.registry.resolve_client(client, params)?;
		let facade = self.facade(&registration, GrantType::ClientCredentials)?;
		let scopes = registration.effective_scopes(params.scopes.as_ref());

		tracing::debug!(
			client = %client,
			registration = %registration.id,
			scopes = %scopes.normalized(),
			"Requesting client credentials token."
		);

		facade
			.exchange_client_credentials(scopes, &params.additional_parameters, self.clock.now())
			.await
	}

	async fn exchange_refresh_token(
		&self,
		token: &UserToken,
		params: &UserTokenRequestParameters,
	) -> Result<UserToken> {
		let refresh_token = token
			.refresh_token
			.as_ref()
			.filter(|secret| !secret.expose().trim().is_empty())
			.ok_or(ConfigError::MissingRefreshToken)?;
		let registration = self.registry.resolve(&params.request)?;
		let facade = self.facade(&registration, GrantType::RefreshToken)?;
		let scopes = params.request.scopes.clone().unwrap_or_default();

		tracing::debug!(
			registration = %registration.id,
			refresh = %refresh_token.fingerprint(),
			"Refreshing user token."
		);

		facade
			.refresh_token(refresh_token, &scopes, &params.request.additional_parameters, self.clock.now())
			.await
	}
}
#[cfg(feature = "reqwest")]
impl OAuth2TokenEndpoint<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a reqwest-backed endpoint over `registry`.
	pub fn reqwest(registry: impl Into<Arc<ClientRegistry>>) -> Self {
		Self::new(registry, ReqwestHttpClient::default(), ReqwestTransportErrorMapper)
	}
}
impl<C, M> Debug for OAuth2TokenEndpoint<C, M>
where
	C: TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuth2TokenEndpoint")
			.field("registrations", &self.registry.len())
			.field("clock", &self.clock)
			.finish()
	}
}
impl<C, M> ClientTokenEndpoint for OAuth2TokenEndpoint<C, M>
where
	C: TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn request_token<'a>(
		&'a self,
		client: &'a ClientName,
		params: &'a TokenRequestParameters,
	) -> EndpointFuture<'a, Token> {
		Box::pin(async move {
			match self.exchange_client_credentials(client, params).await {
				Ok(token) => token,
				Err(e) => {
					tracing::warn!(client = %client, error = %e, "Client credentials request failed.");

					Token::failed(TokenError::from(e))
				},
			}
		})
	}
}
impl<C, M> UserTokenEndpoint for OAuth2TokenEndpoint<C, M>
where
	C: TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn refresh_token<'a>(
		&'a self,
		token: &'a UserToken,
		params: &'a UserTokenRequestParameters,
	) -> EndpointFuture<'a, UserToken> {
		Box::pin(async move {
			match self.exchange_refresh_token(token, params).await {
				Ok(token) => token,
				Err(e) => {
					tracing::warn!(error = %e, "Refresh token request failed.");

					UserToken::failed(TokenError::from(e))
				},
			}
		})
	}
}

/// Reqwest-backed [`OAuth2TokenEndpoint`].
#[cfg(feature = "reqwest")]
pub type ReqwestTokenEndpoint = OAuth2TokenEndpoint<ReqwestHttpClient, ReqwestTransportErrorMapper>;


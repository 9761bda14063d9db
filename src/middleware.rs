//! Outbound request interceptor for [`reqwest_middleware`] clients.
//!
//! [`AccessTokenMiddleware`] attaches `Authorization: <scheme> <token>` to each request,
//! and when the response is `401 Unauthorized` it renews the token with a forced
//! acquisition and sends the request exactly once more. A second `401` is returned
//! untouched, or raised as [`UnauthorizedError`] when
//! [`ManagementOptions::escalate_unauthorized`] is set. Nothing is retained between
//! requests.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use oauth2_token_manager::{auth::ClientName, manager::ClientTokenManager, middleware::*};
//! # fn demo(manager: ClientTokenManager, client: ClientName) {
//! let http = reqwest_middleware::ClientBuilder::new(reqwest::Client::new())
//! 	.with(AccessTokenMiddleware::new(ClientTokenSource::new(manager, client)))
//! 	.build();
//! # }
//! ```

// crates.io
use http::Extensions;
use reqwest::{
	Request, Response, StatusCode,
	header::{AUTHORIZATION, HeaderValue},
};
use reqwest_middleware::{Middleware, Next};
// self
use crate::{
	_prelude::*,
	auth::{ClientName, Token, TokenRequestParameters, UserTokenRequestParameters},
	config::ManagementOptions,
	endpoint::EndpointFuture,
	error::{TokenError, UnauthorizedError},
	manager::{ClientTokenManager, UserTokenManager},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	session::RequestContext,
};

pub use crate::auth::authorization_scheme;

/// Supplies the token the interceptor attaches.
pub trait AccessTokenSource
where
	Self: 'static + Send + Sync,
{
	/// Returns the token for the request carrying `extensions`.
	fn access_token<'a>(
		&'a self,
		extensions: &'a Extensions,
		force_renewal: bool,
	) -> EndpointFuture<'a, Token>;
}

/// Client-credentials tokens for one named client.
///
/// Parameters placed in the request extensions override the configured ones.
#[derive(Clone, Debug)]
pub struct ClientTokenSource {
	manager: ClientTokenManager,
	client: ClientName,
	parameters: Option<TokenRequestParameters>,
}
impl ClientTokenSource {
	/// Creates a source for `client`.
	pub fn new(manager: ClientTokenManager, client: ClientName) -> Self {
		Self { manager, client, parameters: None }
	}

	/// Sets the parameters used for every request.
	pub fn with_parameters(mut self, parameters: TokenRequestParameters) -> Self {
		self.parameters = Some(parameters);

		self
	}
}
impl AccessTokenSource for ClientTokenSource {
	fn access_token<'a>(
		&'a self,
		extensions: &'a Extensions,
		force_renewal: bool,
	) -> EndpointFuture<'a, Token> {
		Box::pin(async move {
			// The force flag applies on top of default parameters too.
			let params = extensions
				.get::<TokenRequestParameters>()
				.or(self.parameters.as_ref())
				.or(self.manager.options().default_parameters.as_ref())
				.cloned()
				.unwrap_or_default()
				.with_force_renewal(force_renewal);

			self.manager.get_access_token(&self.client, Some(&params)).await
		})
	}
}

/// User tokens for the [`RequestContext`] attached to each request.
///
/// Attach the context with
/// [`RequestBuilder::with_extension`](reqwest_middleware::RequestBuilder::with_extension).
/// Requests without one get a [`TokenError::NoActiveUser`] token and go out without an
/// `Authorization` header.
#[derive(Clone, Debug)]
pub struct UserTokenSource {
	manager: UserTokenManager,
	parameters: UserTokenRequestParameters,
}
impl UserTokenSource {
	/// Creates a source backed by `manager`.
	pub fn new(manager: UserTokenManager) -> Self {
		Self { manager, parameters: Default::default() }
	}

	/// Sets the parameters used for every request.
	pub fn with_parameters(mut self, parameters: UserTokenRequestParameters) -> Self {
		self.parameters = parameters;

		self
	}
}
impl AccessTokenSource for UserTokenSource {
	fn access_token<'a>(
		&'a self,
		extensions: &'a Extensions,
		force_renewal: bool,
	) -> EndpointFuture<'a, Token> {
		Box::pin(async move {
			let Some(ctx) = extensions.get::<RequestContext>() else {
				return Token::failed(TokenError::NoActiveUser);
			};
			let params = extensions
				.get::<UserTokenRequestParameters>()
				.unwrap_or(&self.parameters)
				.forced(force_renewal);

			self.manager.get_access_token(ctx, Some(&params)).await.into()
		})
	}
}

/// Attaches access tokens and retries once on `401`.
#[derive(Clone, Debug)]
pub struct AccessTokenMiddleware<S> {
	source: S,
	options: ManagementOptions,
}
impl<S> AccessTokenMiddleware<S>
where
	S: AccessTokenSource,
{
	/// Wraps `source` with default options.
	pub fn new(source: S) -> Self {
		Self { source, options: ManagementOptions::default() }
	}

	/// Overrides the options.
	pub fn with_options(mut self, options: ManagementOptions) -> Self {
		self.options = options;

		self
	}

	async fn authorize(&self, req: &mut Request, extensions: &Extensions, force_renewal: bool) {
		let token = self.source.access_token(extensions, force_renewal).await;

		if let Some(error) = &token.error {
			tracing::warn!(url = %req.url(), error = %error, "Sending request without an access token.");

			return;
		}

		let Some(access_token) = token.access_token() else {
			return;
		};

		match HeaderValue::from_str(&format!("{} {access_token}", token.authorization_scheme())) {
			Ok(mut value) => {
				value.set_sensitive(true);
				req.headers_mut().insert(AUTHORIZATION, value);
			},
			Err(e) => tracing::warn!(error = %e, "Access token is not a valid header value."),
		}
	}

	async fn dispatch(
		&self,
		mut req: Request,
		extensions: &mut Extensions,
		next: Next<'_>,
	) -> reqwest_middleware::Result<Response> {
		const KIND: FlowKind = FlowKind::Interceptor;

		// Cloned before the header goes on so the retry carries only the renewed token.
		let retry = req.try_clone();

		self.authorize(&mut req, extensions, false).await;

		let response = next.clone().run(req, extensions).await?;

		if response.status() != StatusCode::UNAUTHORIZED {
			obs::record_flow_outcome(KIND, FlowOutcome::Success);

			return Ok(response);
		}

		let Some(mut retry) = retry else {
			tracing::warn!(url = %response.url(), "Request body is not cloneable; returning the 401.");
			obs::record_flow_outcome(KIND, FlowOutcome::Failure);

			return Ok(response);
		};

		tracing::debug!(url = %retry.url(), "Received 401; retrying with a renewed token.");
		drop(response);

		self.authorize(&mut retry, extensions, true).await;

		let url = retry.url().clone();
		let response = next.run(retry, extensions).await?;

		if response.status() != StatusCode::UNAUTHORIZED {
			obs::record_flow_outcome(KIND, FlowOutcome::Success);

			return Ok(response);
		}

		obs::record_flow_outcome(KIND, FlowOutcome::Failure);

		if self.options.escalate_unauthorized {
			tracing::warn!(url = %url, "Renewed token rejected; escalating.");

			return Err(reqwest_middleware::Error::middleware(UnauthorizedError { url }));
		}

		Ok(response)
	}
}
#[async_trait::async_trait]
impl<S> Middleware for AccessTokenMiddleware<S>
where
	S: AccessTokenSource,
{
	async fn handle(
		&self,
		req: Request,
		extensions: &mut Extensions,
		next: Next<'_>,
	) -> reqwest_middleware::Result<Response> {
		let span = FlowSpan::new(FlowKind::Interceptor, "handle");

		obs::record_flow_outcome(FlowKind::Interceptor, FlowOutcome::Attempt);

		span.instrument(self.dispatch(req, extensions, next)).await
	}
}

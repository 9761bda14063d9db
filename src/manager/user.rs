//! User token manager.

// self
use crate::{
	_prelude::*,
	auth::{UserToken, UserTokenRequestParameters},
	clock::{SharedClock, SystemClock},
	config::UserTokenOptions,
	endpoint::UserTokenEndpoint,
	error::TokenError,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	session::{RequestContext, SessionError, UserTokenStore},
	sync::SingleFlight,
};

/// Session-backed acquisition of user tokens with coordinated refresh.
///
/// Refreshes are coalesced per refresh token value, so concurrent requests holding the
/// same refresh token share one endpoint call while different users never block each
/// other.
#[derive(Clone)]
pub struct UserTokenManager {
	store: Arc<dyn UserTokenStore>,
	endpoint: Arc<dyn UserTokenEndpoint>,
	options: UserTokenOptions,
	clock: SharedClock,
	flights: SingleFlight<UserToken>,
}
impl UserTokenManager {
	/// Creates a manager with default options and the system clock.
	pub fn new(store: Arc<dyn UserTokenStore>, endpoint: Arc<dyn UserTokenEndpoint>) -> Self {
		Self {
			store,
			endpoint,
			options: UserTokenOptions::default(),
			clock: Arc::new(SystemClock),
			flights: SingleFlight::new(),
		}
	}

	/// Overrides the options.
	pub fn with_options(mut self, options: UserTokenOptions) -> Self {
		self.options = options;

		self
	}

	/// Overrides the clock used for the staleness check.
	pub fn with_clock(mut self, clock: SharedClock) -> Self {
		self.clock = clock;

		self
	}

	/// Returns the current user's access token, refreshing it when due.
	///
	/// A refresh happens when the token is inside the refresh window, when renewal is
	/// forced, or when only a refresh token is stored. A stored access token without a
	/// refresh token is returned as-is.
	pub async fn get_access_token(
		&self,
		ctx: &RequestContext,
		params: Option<&UserTokenRequestParameters>,
	) -> UserToken {
		const KIND: FlowKind = FlowKind::UserRefresh;

		let span = FlowSpan::new(KIND, "get_access_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		span.instrument(async move {
			let params = params.cloned().unwrap_or_default();
			let token = self.current_or_refreshed(ctx, params).await;

			obs::record_flow_outcome(
				KIND,
				if token.is_error() { FlowOutcome::Failure } else { FlowOutcome::Success },
			);

			token
		})
		.await
	}

	/// Forgets the user's stored token.
	pub async fn delete_access_token(
		&self,
		ctx: &RequestContext,
		params: Option<&UserTokenRequestParameters>,
	) -> Result<(), SessionError> {
		let params = params.cloned().unwrap_or_default();

		self.store.clear_token(ctx, &params).await
	}

	async fn current_or_refreshed(
		&self,
		ctx: &RequestContext,
		params: UserTokenRequestParameters,
	) -> UserToken {
		if !ctx.principal().is_authenticated() {
			tracing::debug!("No authenticated user; skipping token lookup.");

			return UserToken::failed(TokenError::NoActiveUser);
		}

		let user = ctx.principal().display_name().to_owned();
		let current = match self.store.get_token(ctx, &params).await {
			Ok(token) => token,
			Err(e) => {
				tracing::warn!(user = %user, error = %e, "Reading the stored user token failed.");

				return UserToken::failed(TokenError::NoTokenData);
			},
		};
		let has_access = current.token.access_token().is_some();
		let refresh =
			current.refresh_token.clone().filter(|secret| !secret.expose().trim().is_empty());
		let Some(refresh) = refresh else {
			if has_access {
				tracing::debug!(user = %user, "No refresh token stored; returning the current token.");

				return current;
			}

			tracing::debug!(user = %user, "No token data stored for the user.");

			return UserToken::failed(TokenError::NoTokenData);
		};
		let now = self.clock.now();
		// An expiry too close to the range bound to subtract the window from is already due.
		let stale = current.token.expires_at.is_some_and(|expires_at| {
			expires_at
				.checked_sub(self.options.refresh_before_expiration)
				.is_none_or(|refresh_at| now >= refresh_at)
		});

		if !(stale || params.request.force_renewal || !has_access) {
			obs::record_flow_outcome(FlowKind::UserRefresh, FlowOutcome::CacheHit);

			return current;
		}

		tracing::debug!(
			user = %user,
			stale,
			forced = params.request.force_renewal,
			missing_access = !has_access,
			"Refreshing the user token."
		);

		let store = self.store.clone();
		let endpoint = self.endpoint.clone();
		let ctx = ctx.clone();

		self.flights
			.synchronize(refresh.fingerprint(), move || async move {
				let latest = match store.get_token(&ctx, &params).await {
					Ok(latest) if latest.refresh_token().is_some() => latest,
					_ => {
						tracing::error!(user = %user, "No refresh token in store.");

						return UserToken::failed(TokenError::NoRefreshToken);
					},
				};
				let refreshed = endpoint.refresh_token(&latest, &params).await;

				if let Some(error) = &refreshed.token.error {
					tracing::error!(user = %user, error = %error, "Refreshing the user token failed.");

					return refreshed;
				}
				if let Err(e) = store.store_token(&ctx, &refreshed, &params).await {
					tracing::warn!(user = %user, error = %e, "Storing the refreshed user token failed.");
				}

				refreshed
			})
			.await
	}
}
impl Debug for UserTokenManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("UserTokenManager")
			.field("options", &self.options)
			.field("clock", &self.clock)
			.field("flights", &self.flights)
			.finish()
	}
}

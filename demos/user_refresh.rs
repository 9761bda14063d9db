//! Demonstrates session-backed user tokens: an expired access token is renewed with the
//! stored refresh token, written back to the session, and attached to an outbound request
//! by the interceptor.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use oauth2_token_manager::{
	auth::{Principal, ProviderId, RegistrationId},
	endpoint::ReqwestTokenEndpoint,
	manager::UserTokenManager,
	middleware::{AccessTokenMiddleware, UserTokenSource},
	provider::{ClientRegistration, ClientRegistry, GrantType, ProviderDescriptor},
	reqwest::Client,
	reqwest_middleware::ClientBuilder,
	session::{AuthenticationTicket, MemorySessionStore, RequestContext, SessionTokenStore},
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").form_urlencoded_tuple("grant_type", "refresh_token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"renewed-access\",\"token_type\":\"bearer\",\"expires_in\":900,\"refresh_token\":\"rotated-refresh\"}",
			);
		})
		.await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/profile").header("authorization", "Bearer renewed-access");
			then.status(200).body("{\"name\":\"Ada\"}");
		})
		.await;
	let descriptor = ProviderDescriptor::builder(ProviderId::new("demo-provider")?)
		.token_endpoint(Url::parse(&server.url("/token"))?)
		.support_grant(GrantType::RefreshToken)
		.build()?;
	let registry = ClientRegistry::default().with_registration(
		ClientRegistration::new(RegistrationId::new("web")?, descriptor, "demo-web")
			.with_client_secret("web-secret"),
	);
	let sessions = Arc::new(MemorySessionStore::default());
	let principal = Principal::authenticated("ada");

	sessions.insert(
		AuthenticationTicket::new(principal.clone(), "")
			.with_item(".Token.access_token", "expired-access")
			.with_item(".Token.refresh_token", "initial-refresh")
			.with_item(".Token.expires_at", "2020-01-01T00:00:00Z"),
	)?;

	let manager = UserTokenManager::new(
		Arc::new(SessionTokenStore::new(sessions.clone())),
		Arc::new(ReqwestTokenEndpoint::reqwest(registry)),
	);
	let http = ClientBuilder::new(Client::new())
		.with(AccessTokenMiddleware::new(UserTokenSource::new(manager)))
		.build();
	let profile = http
		.get(server.url("/profile"))
		.with_extension(RequestContext::new(principal))
		.send()
		.await?
		.text()
		.await?;
	let stored = sessions
		.ticket("ada", None)
		.and_then(|ticket| ticket.properties.items.get(".Token.refresh_token").cloned());

	println!("Profile: {profile}.");
	println!("Stored refresh token: {}.", stored.unwrap_or_default());

	token_mock.assert_async().await;
	api_mock.assert_async().await;

	Ok(())
}

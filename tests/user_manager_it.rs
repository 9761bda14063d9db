// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
// self
use oauth2_token_manager::{
	auth::{Principal, ProviderId, RegistrationId},
	endpoint::ReqwestTokenEndpoint,
	error::TokenError,
	manager::UserTokenManager,
	provider::{ClientAuthMethod, ClientRegistration, ClientRegistry, GrantType, ProviderDescriptor},
	session::{AuthenticationTicket, MemorySessionStore, RequestContext, SessionTokenStore},
	url::Url,
};

const SUBJECT: &str = "user-42";

fn build_manager(server: &MockServer) -> (UserTokenManager, Arc<MemorySessionStore>) {
	let descriptor = ProviderDescriptor::builder(
		ProviderId::new("mock-refresh").expect("Provider identifier should be valid."),
	)
	.token_endpoint(Url::parse(&server.url("/token")).expect("Mock token endpoint should parse."))
	.support_grant(GrantType::RefreshToken)
	.client_auth_method(ClientAuthMethod::ClientSecretPost)
	.build()
	.expect("Provider descriptor should build successfully.");
	let registry = ClientRegistry::default().with_registration(
		ClientRegistration::new(
			RegistrationId::new("web").expect("Registration identifier should be valid."),
			descriptor,
			"web-client",
		)
		.with_client_secret("web-secret"),
	);
	let sessions = Arc::new(MemorySessionStore::default());
	let store = SessionTokenStore::new(sessions.clone());
	let manager =
		UserTokenManager::new(Arc::new(store), Arc::new(ReqwestTokenEndpoint::reqwest(registry)));

	(manager, sessions)
}

fn seed(sessions: &MemorySessionStore, expires_at: &str) -> RequestContext {
	let principal = Principal::authenticated(SUBJECT);
	let ticket = AuthenticationTicket::new(principal.clone(), "")
		.with_item(".Token.access_token", "stale-access")
		.with_item(".Token.refresh_token", "refresh-1")
		.with_item(".Token.token_type", "Bearer")
		.with_item(".Token.expires_at", expires_at);

	sessions.insert(ticket).expect("Seeding a session ticket should succeed.");

	RequestContext::new(principal)
}

fn stored(sessions: &MemorySessionStore, name: &str) -> Option<String> {
	sessions
		.ticket(SUBJECT, None)
		.and_then(|ticket| ticket.properties.items.get(&format!(".Token.{name}")).cloned())
}

#[tokio::test]
async fn expired_user_token_is_refreshed_and_written_back() {
	let server = MockServer::start_async().await;
	let (manager, sessions) = build_manager(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.form_urlencoded_tuple("grant_type", "refresh_token")
				.form_urlencoded_tuple("refresh_token", "refresh-1")
				.form_urlencoded_tuple("client_id", "web-client");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"fresh-access\",\"token_type\":\"Bearer\",\"expires_in\":3600,\"refresh_token\":\"refresh-2\"}",
			);
		})
		.await;
	let ctx = seed(&sessions, "2020-01-01T00:00:00Z");
	let token = manager.get_access_token(&ctx, None).await;

	assert_eq!(token.token.access_token(), Some("fresh-access"));
	assert_eq!(token.refresh_token(), Some("refresh-2"));
	assert_eq!(stored(&sessions, "access_token").as_deref(), Some("fresh-access"));
	assert_eq!(stored(&sessions, "refresh_token").as_deref(), Some("refresh-2"));

	// The next request sees the written-back token and stays off the network.
	let next = RequestContext::new(Principal::authenticated(SUBJECT));

	assert_eq!(manager.get_access_token(&next, None).await.token.access_token(), Some("fresh-access"));

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn valid_user_token_is_served_without_a_request() {
	let server = MockServer::start_async().await;
	let (manager, sessions) = build_manager(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(500);
		})
		.await;
	let ctx = seed(&sessions, "2999-01-01T00:00:00Z");
	let token = manager.get_access_token(&ctx, None).await;

	assert_eq!(token.token.access_token(), Some("stale-access"));

	mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn rejected_refresh_leaves_the_session_untouched() {
	let server = MockServer::start_async().await;
	let (manager, sessions) = build_manager(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400).header("content-type", "application/json").body(
				"{\"error\":\"invalid_grant\",\"error_description\":\"Refresh token revoked.\"}",
			);
		})
		.await;
	let ctx = seed(&sessions, "2020-01-01T00:00:00Z");
	let before = sessions.ticket(SUBJECT, None);
	let token = manager.get_access_token(&ctx, None).await;

	assert_eq!(
		token.token.error,
		Some(TokenError::Upstream {
			code: "invalid_grant".into(),
			description: Some("Refresh token revoked.".into()),
			status: Some(400),
		})
	);
	assert_eq!(sessions.ticket(SUBJECT, None), before);
	assert_eq!(sessions.sign_ins(), 0);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn concurrent_requests_for_one_user_share_a_refresh() {
	let server = MockServer::start_async().await;
	let (manager, sessions) = build_manager(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.delay(std::time::Duration::from_millis(200))
				.body("{\"access_token\":\"shared-access\",\"token_type\":\"Bearer\",\"expires_in\":3600}");
		})
		.await;
	let ctx = seed(&sessions, "2020-01-01T00:00:00Z");
	let other = RequestContext::new(Principal::authenticated(SUBJECT));
	let (a, b) = tokio::join!(manager.get_access_token(&ctx, None), manager.get_access_token(&other, None));

	assert_eq!(a.token.access_token(), Some("shared-access"));
	assert_eq!(a, b);
	// The issuer did not rotate, so the presented refresh token is kept.
	assert_eq!(a.refresh_token(), Some("refresh-1"));

	mock.assert_calls_async(1).await;
}

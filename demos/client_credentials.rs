//! Demonstrates cached client-credentials tokens: the second lookup is served from the
//! in-memory cache and only one request reaches the token endpoint.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use oauth2_token_manager::{
	auth::{ClientName, ProviderId, RegistrationId, ScopeSet},
	cache::DistributedTokenCache,
	endpoint::ReqwestTokenEndpoint,
	manager::ClientTokenManager,
	provider::{ClientRegistration, ClientRegistry, GrantType, ProviderDescriptor},
	store::MemoryCacheStore,
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"bearer\",\"expires_in\":900}",
			);
		})
		.await;
	let descriptor = ProviderDescriptor::builder(ProviderId::new("demo-provider")?)
		.token_endpoint(Url::parse(&server.url("/token"))?)
		.support_grant(GrantType::ClientCredentials)
		.build()?;
	let registration_id = RegistrationId::new("demo")?;
	let client = ClientName::new("service-router")?;
	let registry = ClientRegistry::default()
		.with_registration(
			ClientRegistration::new(registration_id.clone(), descriptor, "demo-client")
				.with_client_secret("super-secret")
				.with_default_scopes(ScopeSet::new(["email.read", "profile.read"])?),
		)
		.with_client(client.clone(), registration_id);
	let cache = DistributedTokenCache::<MemoryCacheStore>::new(MemoryCacheStore::default());
	let manager =
		ClientTokenManager::new(Arc::new(cache), Arc::new(ReqwestTokenEndpoint::reqwest(registry)));
	let first = manager.get_access_token(&client, None).await;
	let second = manager.get_access_token(&client, None).await;

	if let Some(error) = &first.error {
		color_eyre::eyre::bail!("Token acquisition failed: {error}.");
	}

	println!(
		"Access token {} ({} scheme), reused: {}.",
		first.access_token().unwrap_or_default(),
		first.authorization_scheme(),
		first == second
	);

	token_mock.assert_async().await;

	Ok(())
}

//! `oauth2` facade performing the two token endpoint grants.

pub use oauth2;

// crates.io
use oauth2::{
	AccessToken, AuthType, Client, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, RefreshToken, RequestTokenError, Scope, StandardRevocableToken, TokenResponse,
	TokenType, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRequestTokenError, BasicRevocationErrorResponse,
		BasicTokenIntrospectionResponse,
	},
};
use serde::{Deserializer, Serializer};
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, Token, TokenSecret, UserToken},
	error::{ConfigError, TransientError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	provider::{ClientAuthMethod, ClientRegistration, GrantType},
};

type ConfiguredClient = Client<
	BasicErrorResponse,
	FacadeTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Maps HTTP transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] raised during `grant` into an [`Error`].
	fn map_transport_error(
		&self,
		grant: GrantType,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		grant: GrantType,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(grant, meta, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => transient(meta, format!("HTTP client error: {message}")),
			_ => transient(meta, "HTTP client error"),
		}
	}
}

/// `token_type` exactly as the issuer reported it; casing is preserved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportedTokenType(String);
impl AsRef<str> for ReportedTokenType {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl TokenType for ReportedTokenType {}

/// Successful token endpoint body.
///
/// `oauth2`'s standard response folds `token_type` to lowercase while deserializing, which
/// would turn `DPoP` into `dpop`; this one keeps the reported value.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct FacadeTokenResponse {
	access_token: AccessToken,
	token_type: ReportedTokenType,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	expires_in: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	refresh_token: Option<RefreshToken>,
	#[serde(
		rename = "scope",
		default,
		skip_serializing_if = "Option::is_none",
		deserialize_with = "deserialize_scopes",
		serialize_with = "serialize_scopes"
	)]
	scopes: Option<Vec<Scope>>,
}
impl TokenResponse for FacadeTokenResponse {
	type TokenType = ReportedTokenType;

	fn access_token(&self) -> &AccessToken {
		&self.access_token
	}

	fn token_type(&self) -> &Self::TokenType {
		&self.token_type
	}

	fn expires_in(&self) -> Option<std::time::Duration> {
		self.expires_in.map(std::time::Duration::from_secs)
	}

	fn refresh_token(&self) -> Option<&RefreshToken> {
		self.refresh_token.as_ref()
	}

	fn scopes(&self) -> Option<&Vec<Scope>> {
		self.scopes.as_ref()
	}
}

fn deserialize_scopes<'de, D>(deserializer: D) -> Result<Option<Vec<Scope>>, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = <Option<String>>::deserialize(deserializer)?;

	Ok(raw.map(|raw| raw.split_whitespace().map(|scope| Scope::new(scope.to_owned())).collect()))
}

fn serialize_scopes<S>(scopes: &Option<Vec<Scope>>, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	match scopes {
		Some(scopes) => serializer.serialize_some(
			&scopes.iter().map(|scope| scope.as_str()).collect::<Vec<_>>().join(" "),
		),
		None => serializer.serialize_none(),
	}
}

/// One registration's `oauth2` client plus the transport that drives it.
pub(crate) struct BasicFacade<C, M>
where
	C: TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredClient,
	scope_delimiter: char,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> BasicFacade<C, M>
where
	C: TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn from_registration(
		registration: &ClientRegistration,
		http_client: Arc<C>,
		error_mapper: Arc<M>,
	) -> Result<Self> {
		let descriptor = &registration.descriptor;
		let token_url = TokenUrl::new(descriptor.token_endpoint.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let secret = registration
			.client_secret
			.as_ref()
			.filter(|_| !matches!(descriptor.client_auth_method, ClientAuthMethod::None));
		let mut oauth_client: ConfiguredClient =
			Client::new(ClientId::new(registration.client_id.clone())).set_token_uri(token_url);

		if let Some(secret) = secret {
			oauth_client = oauth_client.set_client_secret(ClientSecret::new(secret.expose().to_owned()));
		}
		if matches!(descriptor.client_auth_method, ClientAuthMethod::ClientSecretPost) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Ok(Self {
			oauth_client,
			scope_delimiter: descriptor.quirks.scope_delimiter,
			http_client,
			error_mapper,
		})
	}

	/// Performs the client-credentials grant.
	pub(crate) fn exchange_client_credentials<'a>(
		&'a self,
		scopes: &'a ScopeSet,
		extra_params: &'a BTreeMap<String, String>,
		now: OffsetDateTime,
	) -> FacadeFuture<'a, Token> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let (scopes, fields) = request_fields(self.scope_delimiter, scopes, extra_params);
			let request = fields.into_iter().fold(
				self.oauth_client.exchange_client_credentials().add_scopes(scopes),
				|request, (name, value)| request.add_extra_param(name, value),
			);
			let response = request.request_async(&instrumented).await.map_err(|err| {
				self.map_request_error(GrantType::ClientCredentials, meta.take(), err)
			})?;

			map_token_response(&response, now)
		})
	}

	/// Performs the refresh-token grant.
	///
	/// The presented refresh token is kept when the response does not rotate it.
	pub(crate) fn refresh_token<'a>(
		&'a self,
		refresh_token: &'a TokenSecret,
		scopes: &'a ScopeSet,
		extra_params: &'a BTreeMap<String, String>,
		now: OffsetDateTime,
	) -> FacadeFuture<'a, UserToken> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let refresh_secret = RefreshToken::new(refresh_token.expose().to_owned());
			let (scopes, fields) = request_fields(self.scope_delimiter, scopes, extra_params);
			let request = fields.into_iter().fold(
				self.oauth_client.exchange_refresh_token(&refresh_secret).add_scopes(scopes),
				|request, (name, value)| request.add_extra_param(name, value),
			);
			let response = request.request_async(&instrumented).await.map_err(|err| {
				self.map_request_error(GrantType::RefreshToken, meta.take(), err)
			})?;
			let token = map_token_response(&response, now)?;
			let rotated = response
				.refresh_token()
				.map(|secret| secret.secret().as_str())
				.filter(|secret| !secret.trim().is_empty())
				.map(TokenSecret::new);

			Ok(UserToken::new(token, rotated.or_else(|| Some(refresh_token.clone()))))
		})
	}

	fn map_request_error(
		&self,
		grant: GrantType,
		meta: Option<ResponseMetadata>,
		err: BasicRequestTokenError<HttpClientError<C::TransportError>>,
	) -> Error {
		let meta = meta.as_ref();

		match err {
			RequestTokenError::ServerResponse(response) => map_server_response(response, meta),
			RequestTokenError::Request(error) =>
				self.error_mapper.map_transport_error(grant, meta, error),
			RequestTokenError::Parse(source, _body) =>
				TransientError::TokenResponseParse {
					source,
					status: meta_status(meta),
					retry_after: meta_retry_after(meta),
				}
				.into(),
			RequestTokenError::Other(message) => transient(meta, message),
		}
	}
}

/// Typed scopes plus extra form fields for one grant request.
///
/// Space-delimited providers get the scopes through `oauth2`; any other delimiter is sent
/// as a prejoined `scope` field.
fn request_fields(
	delimiter: char,
	scopes: &ScopeSet,
	extra_params: &BTreeMap<String, String>,
) -> (Vec<Scope>, Vec<(String, String)>) {
	let mut fields = Vec::with_capacity(extra_params.len() + 1);
	let mut typed = Vec::new();

	if !scopes.is_empty() {
		if delimiter == ' ' {
			typed.extend(scopes.iter().map(|scope| Scope::new(scope.to_owned())));
		} else {
			fields.push(("scope".to_owned(), scopes.joined(delimiter)));
		}
	}

	fields.extend(extra_params.iter().map(|(name, value)| (name.clone(), value.clone())));

	(typed, fields)
}

fn map_token_response(response: &FacadeTokenResponse, now: OffsetDateTime) -> Result<Token> {
	let mut builder = Token::builder(response.access_token().secret().to_owned())
		.token_type(response.token_type().as_ref());

	// A zero or absent lifetime means the token never expires.
	if let Some(lifetime) = response.expires_in().filter(|lifetime| !lifetime.is_zero()) {
		let seconds =
			i64::try_from(lifetime.as_secs()).map_err(|_| ConfigError::ExpiresInOutOfRange)?;
		let expires_at =
			now.checked_add(Duration::seconds(seconds)).ok_or(ConfigError::ExpiresInOutOfRange)?;

		builder = builder.expires_at(expires_at);
	}
	if let Some(scopes) = response.scopes() {
		let granted = scopes.iter().map(|scope| scope.as_str()).collect::<Vec<_>>().join(" ");

		builder = builder.scope(granted);
	}

	Ok(builder.build().map_err(ConfigError::from)?)
}

fn map_server_response(response: BasicErrorResponse, meta: Option<&ResponseMetadata>) -> Error {
	Error::Upstream {
		code: response.error().as_ref().to_owned(),
		description: response.error_description().cloned(),
		status: meta_status(meta),
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(grant: GrantType, meta: Option<&ResponseMetadata>, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::TokenEndpoint {
			message: format!("Request timed out during the {grant} grant"),
			status: meta_status(meta).or_else(|| err.status().map(|code| code.as_u16())),
			retry_after: meta_retry_after(meta),
		}
		.into();
	}

	TransportError::from(err).into()
}

fn transient(meta: Option<&ResponseMetadata>, message: impl Into<String>) -> Error {
	TransientError::TokenEndpoint {
		message: message.into(),
		status: meta_status(meta),
		retry_after: meta_retry_after(meta),
	}
	.into()
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::{
		auth::{ProviderId, RegistrationId},
		http::ReqwestHttpClient,
		provider::ProviderDescriptor,
	};

	fn registration(method: ClientAuthMethod) -> ClientRegistration {
		let descriptor = ProviderDescriptor::builder(
			ProviderId::new("test-provider").expect("Provider identifier fixture should be valid."),
		)
		.token_endpoint(
			Url::parse("https://example.com/oauth2/token").expect("Token URL fixture should parse."),
		)
		.support_grant(GrantType::ClientCredentials)
		.client_auth_method(method)
		.build()
		.expect("Descriptor fixture should be valid.");

		ClientRegistration::new(
			RegistrationId::new("primary").expect("Registration identifier fixture should be valid."),
			descriptor,
			"client-id",
		)
		.with_client_secret("secret")
	}

	#[test]
	fn builds_clients_for_every_auth_method() {
		for method in
			[ClientAuthMethod::ClientSecretBasic, ClientAuthMethod::ClientSecretPost, ClientAuthMethod::None]
		{
			let facade = <BasicFacade<ReqwestHttpClient, ReqwestTransportErrorMapper>>::from_registration(
				&registration(method),
				Arc::new(ReqwestHttpClient::default()),
				Arc::new(ReqwestTransportErrorMapper),
			);

			assert!(facade.is_ok(), "Facade should build for {method:?}.");
		}
	}

	#[test]
	fn token_responses_map_lifetime_and_scope() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let response: FacadeTokenResponse = serde_json::from_str(
			r#"{"access_token":"at","token_type":"bearer","expires_in":3600,"scope":"api email"}"#,
		)
		.expect("Token response fixture should deserialize.");
		let token = map_token_response(&response, now).expect("Token response should map.");

		assert_eq!(token.access_token(), Some("at"));
		assert_eq!(token.expires_at, Some(macros::datetime!(2025-01-01 01:00 UTC)));
		assert_eq!(token.scope.as_deref(), Some("api email"));
		assert_eq!(token.authorization_scheme(), "Bearer");

		let response: FacadeTokenResponse =
			serde_json::from_str(r#"{"access_token":"at","token_type":"bearer","expires_in":0}"#)
				.expect("Token response fixture should deserialize.");
		let token = map_token_response(&response, now).expect("Token response should map.");

		assert!(token.never_expires());
	}

	#[test]
	fn token_type_casing_is_kept_verbatim() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let response: FacadeTokenResponse = serde_json::from_str(
			r#"{"access_token":"at","token_type":"DPoP","refresh_token":"rt"}"#,
		)
		.expect("Token response fixture should deserialize.");
		let token = map_token_response(&response, now).expect("Token response should map.");

		assert_eq!(token.token_type.as_deref(), Some("DPoP"));
		assert_eq!(token.authorization_scheme(), "DPoP");
		assert_eq!(response.refresh_token().map(|secret| secret.secret().as_str()), Some("rt"));
		assert_eq!(response.scopes(), None);
	}

	#[test]
	fn request_fields_follow_the_scope_delimiter() {
		let scopes = ScopeSet::new(["b", "a"]).expect("Scope fixture should be valid.");
		let extra = BTreeMap::from([("audience".to_owned(), "api".to_owned())]);
		let (typed, fields) = request_fields(' ', &scopes, &extra);

		assert_eq!(typed, vec![Scope::new("a".into()), Scope::new("b".into())]);
		assert_eq!(fields, vec![("audience".to_owned(), "api".to_owned())]);

		let (typed, fields) = request_fields(',', &scopes, &extra);

		assert!(typed.is_empty());
		assert_eq!(fields, vec![
			("scope".to_owned(), "a,b".to_owned()),
			("audience".to_owned(), "api".to_owned()),
		]);

		let (typed, fields) = request_fields(' ', &ScopeSet::default(), &BTreeMap::new());

		assert!(typed.is_empty() && fields.is_empty());
	}

	#[test]
	fn server_errors_become_upstream_errors() {
		let response: BasicErrorResponse = serde_json::from_str(
			r#"{"error":"invalid_grant","error_description":"Refresh token revoked."}"#,
		)
		.expect("Error response fixture should deserialize.");
		let meta = ResponseMetadata { status: Some(400), retry_after: None };

		match map_server_response(response, Some(&meta)) {
			Error::Upstream { code, description, status } => {
				assert_eq!(code, "invalid_grant");
				assert_eq!(description.as_deref(), Some("Refresh token revoked."));
				assert_eq!(status, Some(400));
			},
			other => panic!("Unexpected error: {other:?}."),
		}
	}
}

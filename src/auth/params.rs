//! Per-request acquisition intent.

// self
use crate::{
	_prelude::*,
	auth::{ProviderId, RegistrationId, ScopeSet},
};

/// Parameters shaping a single token acquisition. Never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenRequestParameters {
	/// Skip cached or stored tokens and always call the token endpoint.
	pub force_renewal: bool,
	/// Requested scopes. Also part of the client token cache key.
	pub scopes: Option<ScopeSet>,
	/// Selects the registration by issuer.
	pub issuer: Option<Url>,
	/// Selects the registration by identifier.
	pub registration_id: Option<RegistrationId>,
	/// Selects the registration by provider name.
	pub provider_name: Option<ProviderId>,
	/// Extra form fields sent with the token request.
	pub additional_parameters: BTreeMap<String, String>,
	/// Opaque values for custom endpoint implementations.
	pub properties: BTreeMap<String, String>,
}
impl TokenRequestParameters {
	/// Returns a copy with `force_renewal` set to `force`.
	pub fn forced(&self, force: bool) -> Self {
		Self { force_renewal: force, ..self.clone() }
	}

	/// Sets `force_renewal`.
	pub fn with_force_renewal(mut self, force: bool) -> Self {
		self.force_renewal = force;

		self
	}

	/// Sets the requested scopes.
	pub fn with_scopes(mut self, scopes: ScopeSet) -> Self {
		self.scopes = Some(scopes);

		self
	}

	/// Selects a registration by issuer.
	pub fn with_issuer(mut self, issuer: Url) -> Self {
		self.issuer = Some(issuer);

		self
	}

	/// Selects a registration by identifier.
	pub fn with_registration_id(mut self, id: RegistrationId) -> Self {
		self.registration_id = Some(id);

		self
	}

	/// Selects a registration by provider name.
	pub fn with_provider_name(mut self, name: ProviderId) -> Self {
		self.provider_name = Some(name);

		self
	}

	/// Adds an extra form field to the token request.
	pub fn with_additional_parameter(
		mut self,
		name: impl Into<String>,
		value: impl Into<String>,
	) -> Self {
		self.additional_parameters.insert(name.into(), value.into());

		self
	}

	/// Adds an opaque property.
	pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.properties.insert(name.into(), value.into());

		self
	}
}

/// [`TokenRequestParameters`] plus the session schemes used by the user token store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserTokenRequestParameters {
	/// Shared acquisition parameters.
	#[serde(flatten)]
	pub request: TokenRequestParameters,
	/// Scheme whose session holds the tokens; `None` selects the default scheme.
	pub sign_in_scheme: Option<String>,
	/// Scheme that obtained the tokens; used to scope session entries.
	pub challenge_scheme: Option<String>,
}
impl UserTokenRequestParameters {
	/// Wraps shared parameters.
	pub fn new(request: TokenRequestParameters) -> Self {
		Self { request, ..Default::default() }
	}

	/// Returns a copy with `force_renewal` set to `force`.
	pub fn forced(&self, force: bool) -> Self {
		Self { request: self.request.forced(force), ..self.clone() }
	}

	/// Sets the sign-in scheme.
	pub fn with_sign_in_scheme(mut self, scheme: impl Into<String>) -> Self {
		self.sign_in_scheme = Some(scheme.into());

		self
	}

	/// Sets the challenge scheme.
	pub fn with_challenge_scheme(mut self, scheme: impl Into<String>) -> Self {
		self.challenge_scheme = Some(scheme.into());

		self
	}
}
impl From<TokenRequestParameters> for UserTokenRequestParameters {
	fn from(request: TokenRequestParameters) -> Self {
		Self::new(request)
	}
}

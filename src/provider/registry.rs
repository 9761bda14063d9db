//! Client registrations and selector-based lookup.

// self
use crate::{
	_prelude::*,
	auth::{ClientName, RegistrationId, ScopeSet, TokenRequestParameters, TokenSecret},
	error::ConfigError,
	provider::ProviderDescriptor,
};

/// Credentials bound to one provider descriptor.
#[derive(Clone, Debug)]
pub struct ClientRegistration {
	/// Registration identifier; matched against `registration_id` selectors.
	pub id: RegistrationId,
	/// Provider the registration talks to.
	pub descriptor: ProviderDescriptor,
	/// OAuth client identifier.
	pub client_id: String,
	/// Client secret for confidential clients.
	pub client_secret: Option<TokenSecret>,
	/// Scopes requested when the caller does not name any.
	pub default_scopes: ScopeSet,
}
impl ClientRegistration {
	/// Creates a public registration with no default scopes.
	pub fn new(id: RegistrationId, descriptor: ProviderDescriptor, client_id: impl Into<String>) -> Self {
		Self {
			id,
			descriptor,
			client_id: client_id.into(),
			client_secret: None,
			default_scopes: ScopeSet::default(),
		}
	}

	/// Attaches a client secret.
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(TokenSecret::new(secret));

		self
	}

	/// Sets the scopes used when a request carries none.
	pub fn with_default_scopes(mut self, scopes: ScopeSet) -> Self {
		self.default_scopes = scopes;

		self
	}

	/// Picks the request scopes, falling back to the registration defaults.
	pub fn effective_scopes<'a>(&'a self, requested: Option<&'a ScopeSet>) -> &'a ScopeSet {
		requested.filter(|scopes| !scopes.is_empty()).unwrap_or(&self.default_scopes)
	}
}

/// Registry of client registrations plus the named-client bindings.
///
/// Registration order matters: the first registration is the default target when a
/// request carries no selector.
#[derive(Clone, Debug, Default)]
pub struct ClientRegistry {
	registrations: Vec<Arc<ClientRegistration>>,
	clients: HashMap<ClientName, RegistrationId>,
}
impl ClientRegistry {
	/// Adds a registration, replacing any earlier one with the same identifier.
	pub fn register(&mut self, registration: ClientRegistration) -> &mut Self {
		let registration = Arc::new(registration);

		match self.registrations.iter_mut().find(|r| r.id == registration.id) {
			Some(slot) => *slot = registration,
			None => self.registrations.push(registration),
		}

		self
	}

	/// Binds a client name to a registration identifier.
	pub fn register_client(&mut self, client: ClientName, registration: RegistrationId) -> &mut Self {
		self.clients.insert(client, registration);

		self
	}

	/// Builder-style variant of [`ClientRegistry::register`].
	pub fn with_registration(mut self, registration: ClientRegistration) -> Self {
		self.register(registration);

		self
	}

	/// Builder-style variant of [`ClientRegistry::register_client`].
	pub fn with_client(mut self, client: ClientName, registration: RegistrationId) -> Self {
		self.register_client(client, registration);

		self
	}

	/// Number of registrations.
	pub fn len(&self) -> usize {
		self.registrations.len()
	}

	/// Returns true when nothing has been registered.
	pub fn is_empty(&self) -> bool {
		self.registrations.is_empty()
	}

	/// Looks up a registration by identifier.
	pub fn get(&self, id: &RegistrationId) -> Option<Arc<ClientRegistration>> {
		self.registrations.iter().find(|r| &r.id == id).cloned()
	}

	/// Resolves the registration backing a named client.
	///
	/// Unbound names fall back to the request selectors; with no selectors either the
	/// lookup fails with [`ConfigError::UnknownClient`].
	pub fn resolve_client(
		&self,
		client: &ClientName,
		params: &TokenRequestParameters,
	) -> Result<Arc<ClientRegistration>, ConfigError> {
		if let Some(id) = self.clients.get(client) {
			return self.get(id).ok_or_else(|| ConfigError::UnknownClient { client: client.to_string() });
		}
		if has_selector(params) {
			return self.resolve(params);
		}

		Err(ConfigError::UnknownClient { client: client.to_string() })
	}

	/// Resolves a registration from request selectors.
	///
	/// Precedence is `registration_id`, then `issuer`, then `provider_name`. Without any
	/// selector the first registration is used.
	pub fn resolve(&self, params: &TokenRequestParameters) -> Result<Arc<ClientRegistration>, ConfigError> {
		let found = if let Some(id) = &params.registration_id {
			self.get(id)
		} else if let Some(issuer) = &params.issuer {
			self.registrations
				.iter()
				.find(|r| r.descriptor.issuer.as_ref().is_some_and(|i| same_issuer(i, issuer)))
				.cloned()
		} else if let Some(provider) = &params.provider_name {
			self.registrations.iter().find(|r| &r.descriptor.id == provider).cloned()
		} else {
			self.registrations.first().cloned()
		};

		found.ok_or(ConfigError::NoMatchingRegistration)
	}
}

fn has_selector(params: &TokenRequestParameters) -> bool {
	params.registration_id.is_some() || params.issuer.is_some() || params.provider_name.is_some()
}

// Issuers compare without a trailing slash.
fn same_issuer(a: &Url, b: &Url) -> bool {
	a.as_str().trim_end_matches('/') == b.as_str().trim_end_matches('/')
}

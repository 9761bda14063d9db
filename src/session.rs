//! Session-backed persistence for user tokens.
//!
//! A host web framework owns the real session (cookie, server-side ticket, ...). This
//! module only needs the narrow [`SessionStore`] contract: authenticate a scheme for a
//! principal and re-issue an updated ticket. [`RequestContext`] is the request-scoped
//! object the host creates once per inbound request; it caches the tickets read during
//! that request so repeated token lookups do not re-authenticate.

pub mod memory;
pub mod token_store;

pub use memory::MemorySessionStore;
pub use token_store::{SessionTokenStore, UserTokenStore};

// self
use crate::{_prelude::*, auth::Principal};

/// Boxed future returned by session operations.
pub type SessionFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, SessionError>> + 'a + Send>>;

/// Failures raised by [`SessionStore`] and [`UserTokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum SessionError {
	/// The scheme produced no ticket for the principal.
	#[error("Cannot authenticate scheme `{scheme}`.")]
	CannotAuthenticate {
		/// Scheme name; empty for the default scheme.
		scheme: String,
	},
	/// The ticket holds no token entries.
	#[error("No tokens in properties.")]
	NoTokens,
	/// Tokens cannot be written for an unauthenticated principal.
	#[error("Cannot store tokens for an anonymous principal.")]
	Anonymous,
	/// Backend-level failure.
	#[error("Session backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Named values and lifetime metadata attached to a session ticket.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthenticationProperties {
	/// Arbitrary named entries; tokens live under the `.Token.` prefix.
	pub items: BTreeMap<String, String>,
	/// When the session was issued.
	#[serde(with = "time::serde::rfc3339::option")]
	pub issued_at: Option<OffsetDateTime>,
	/// When the session expires.
	#[serde(with = "time::serde::rfc3339::option")]
	pub expires_at: Option<OffsetDateTime>,
	/// Whether the session may be renewed; `None` defers to the store's sliding setting.
	pub allow_refresh: Option<bool>,
}

/// Authenticated session for one scheme.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationTicket {
	/// Principal the session belongs to.
	pub principal: Principal,
	/// Session properties.
	pub properties: AuthenticationProperties,
	/// Scheme that issued the ticket; empty for the default scheme.
	pub scheme: String,
}
impl AuthenticationTicket {
	/// Creates a ticket with empty properties.
	pub fn new(principal: Principal, scheme: impl Into<String>) -> Self {
		Self { principal, properties: Default::default(), scheme: scheme.into() }
	}

	/// Adds a property item.
	pub fn with_item(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.properties.items.insert(name.into(), value.into());

		self
	}
}

/// Host session contract.
pub trait SessionStore
where
	Self: Send + Sync,
{
	/// Reads the ticket `scheme` holds for `principal`. `None` selects the default scheme.
	fn authenticate<'a>(
		&'a self,
		principal: &'a Principal,
		scheme: Option<&'a str>,
	) -> SessionFuture<'a, Option<AuthenticationTicket>>;

	/// Re-issues the session with an updated ticket.
	fn sign_in<'a>(
		&'a self,
		principal: &'a Principal,
		scheme: Option<&'a str>,
		ticket: AuthenticationTicket,
	) -> SessionFuture<'a, ()>;

	/// Whether `scheme` renews session lifetimes on activity.
	fn sliding_expiration(&self, scheme: Option<&str>) -> bool;
}

/// Request-scoped state: the current principal and the tickets read so far.
///
/// Clones share the ticket cache, so a context can be handed to a spawned refresh and
/// still observe the write-back.
#[derive(Clone, Debug)]
pub struct RequestContext {
	principal: Principal,
	tickets: Arc<Mutex<HashMap<String, AuthenticationTicket>>>,
}
impl RequestContext {
	/// Starts a context for `principal`.
	pub fn new(principal: Principal) -> Self {
		Self { principal, tickets: Default::default() }
	}

	/// Principal for this request.
	pub fn principal(&self) -> &Principal {
		&self.principal
	}

	/// Ticket cached for `scheme` during this request.
	pub fn cached_ticket(&self, scheme: Option<&str>) -> Option<AuthenticationTicket> {
		self.tickets.lock().get(scheme.unwrap_or_default()).cloned()
	}

	/// Caches `ticket` for `scheme` for the rest of this request.
	pub fn cache_ticket(&self, scheme: Option<&str>, ticket: AuthenticationTicket) {
		self.tickets.lock().insert(scheme.unwrap_or_default().to_owned(), ticket);
	}
}

//! Error taxonomy shared by the cache, session, endpoint, and interceptor layers.
//!
//! [`Error`] carries configuration and exchange failures inside the crate. Token
//! acquisition never returns it to callers: managers fold every failure into a
//! [`TokenError`] stored on the returned token so coalesced waiters observe the same
//! value.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error raised while preparing or performing a token exchange.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Token endpoint answered with an OAuth error response.
	#[error("Token endpoint returned an OAuth error: {code}.")]
	Upstream {
		/// OAuth `error` code, e.g. `invalid_grant`.
		code: String,
		/// OAuth `error_description`, when supplied.
		description: Option<String>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Provider descriptor contains an invalid URL.
	#[error("Descriptor contains an invalid URL.")]
	InvalidDescriptor {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},

	/// Descriptor does not enable the requested grant.
	#[error("Descriptor `{descriptor}` does not enable the {grant} grant.")]
	UnsupportedGrant {
		/// Provider identifier string.
		descriptor: String,
		/// Disabled grant label.
		grant: &'static str,
	},
	/// No registration is known for the named client.
	#[error("No registration is configured for client `{client}`.")]
	UnknownClient {
		/// Client name that failed to resolve.
		client: String,
	},
	/// No registration matches the request selectors.
	#[error("No client registration matches the request.")]
	NoMatchingRegistration,
	/// Refresh was attempted without a refresh token.
	#[error("Token is missing a refresh token.")]
	MissingRefreshToken,
	/// Token builder validation failed.
	#[error("Unable to build token.")]
	TokenBuild(#[from] crate::auth::TokenBuildError),
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants.
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Token endpoint returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Failure recorded on a token instead of an access token.
///
/// The value is cloneable and serializable so a single failed acquisition can be
/// handed to every coalesced caller and round-trip through caches unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TokenError {
	/// The request context carries no authenticated principal.
	#[error("No active user.")]
	NoActiveUser,
	/// The session holds neither an access token nor a refresh token.
	#[error("No token data for user.")]
	NoTokenData,
	/// The session lost its refresh token before the refresh ran.
	#[error("No refresh token in store.")]
	NoRefreshToken,
	/// Token endpoint rejected the request with an OAuth error code.
	#[error("{}", upstream_message(.code, .description))]
	Upstream {
		/// OAuth `error` code.
		code: String,
		/// OAuth `error_description`, when supplied.
		description: Option<String>,
		/// HTTP status of the error response.
		#[serde(default, skip_serializing_if = "Option::is_none")]
		status: Option<u16>,
	},
	/// Exchange failed before a usable response was received.
	#[error("{message}")]
	Exchange {
		/// Human-readable failure summary.
		message: String,
		/// HTTP status, when the endpoint answered at all.
		#[serde(default, skip_serializing_if = "Option::is_none")]
		status: Option<u16>,
		/// Retry-After hint sent with the response.
		#[serde(default, skip_serializing_if = "Option::is_none")]
		retry_after: Option<Duration>,
	},
}
impl TokenError {
	/// Wraps a local failure that never reached the token endpoint.
	pub fn exchange(message: impl Into<String>) -> Self {
		Self::Exchange { message: message.into(), status: None, retry_after: None }
	}

	/// HTTP status of the token endpoint response behind this failure.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Upstream { status, .. } | Self::Exchange { status, .. } => *status,
			_ => None,
		}
	}

	/// How long the token endpoint asked callers to back off, if it said so.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::Exchange { retry_after, .. } => *retry_after,
			_ => None,
		}
	}
}
impl From<Error> for TokenError {
	fn from(e: Error) -> Self {
		let (status, retry_after) = match &e {
			Error::Transient(
				TransientError::TokenEndpoint { status, retry_after, .. }
				| TransientError::TokenResponseParse { status, retry_after, .. },
			) => (*status, *retry_after),
			_ => (None, None),
		};

		match e {
			Error::Upstream { code, description, status } =>
				Self::Upstream { code, description, status },
			other => Self::Exchange { message: other.to_string(), status, retry_after },
		}
	}
}

fn upstream_message<'a>(code: &'a str, description: &'a Option<String>) -> &'a str {
	description.as_deref().unwrap_or(code)
}

/// Raised by the outbound interceptor when a request is still rejected with `401` after a
/// forced token renewal and escalation is enabled.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Request to {url} was rejected as unauthorized after a forced token renewal.")]
pub struct UnauthorizedError {
	/// Target of the rejected request.
	pub url: Url,
}

//! Spans and counters for token acquisition.
//!
//! Every acquisition runs inside a span named `oauth2_token_manager.flow` carrying the
//! `flow` and `stage` fields. With the `metrics` feature enabled each outcome also bumps
//! the `oauth2_token_manager_flow_total` counter, labeled by `flow` and `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Acquisition paths observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Cached client-credentials acquisition.
	ClientCredentials,
	/// Stored user token refresh.
	UserRefresh,
	/// Outbound request interception.
	Interceptor,
}
impl FlowKind {
	/// Stable label for span and metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::ClientCredentials => "client_credentials",
			FlowKind::UserRefresh => "refresh_token",
			FlowKind::Interceptor => "interceptor",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry into an acquisition.
	Attempt,
	/// Served from the cache or the session store without an endpoint call.
	CacheHit,
	/// Endpoint call produced a token.
	Success,
	/// Acquisition ended with an error token.
	Failure,
}
impl FlowOutcome {
	/// Stable label for span and metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::CacheHit => "cache_hit",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

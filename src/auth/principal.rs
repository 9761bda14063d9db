//! The signed-in user on whose behalf user tokens are managed.

// self
use crate::_prelude::*;

/// Claim carrying the display name.
pub const NAME_CLAIM: &str = "name";
/// Claim carrying the subject identifier.
pub const SUBJECT_CLAIM: &str = "sub";

/// Authenticated (or anonymous) user plus the claims the host attached to it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
	authenticated: bool,
	claims: BTreeMap<String, String>,
}
impl Principal {
	/// Creates an authenticated principal identified by `subject`.
	pub fn authenticated(subject: impl Into<String>) -> Self {
		Self { authenticated: true, claims: BTreeMap::new() }.with_claim(SUBJECT_CLAIM, subject)
	}

	/// Creates an unauthenticated principal.
	pub fn anonymous() -> Self {
		Self::default()
	}

	/// Adds or replaces a claim.
	pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.claims.insert(name.into(), value.into());

		self
	}

	/// Whether the host authenticated this principal.
	pub fn is_authenticated(&self) -> bool {
		self.authenticated
	}

	/// Returns a claim value.
	pub fn claim(&self, name: &str) -> Option<&str> {
		self.claims.get(name).map(String::as_str)
	}

	/// Subject identifier, if present.
	pub fn subject(&self) -> Option<&str> {
		self.claim(SUBJECT_CLAIM)
	}

	/// Name used in logs: the `name` claim, then `sub`, then `"unknown"`.
	pub fn display_name(&self) -> &str {
		self.claim(NAME_CLAIM).or_else(|| self.subject()).unwrap_or("unknown")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn display_name_prefers_name_then_subject() {
		let named = Principal::authenticated("user-1").with_claim(NAME_CLAIM, "Ada");

		assert_eq!(named.display_name(), "Ada");
		assert_eq!(Principal::authenticated("user-1").display_name(), "user-1");
		assert_eq!(Principal::anonymous().display_name(), "unknown");
		assert!(!Principal::anonymous().is_authenticated());
	}
}

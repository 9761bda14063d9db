//! Normalized OAuth scope sets.

// std
use std::collections::BTreeSet;
// crates.io
use serde::{Deserializer, Serializer, de::Error as DeError};
// self
use crate::_prelude::*;

/// Errors emitted when validating scopes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ScopeValidationError {
	/// Empty scope entries are not allowed.
	#[error("Scope entries cannot be empty.")]
	Empty,
	/// Scopes cannot contain embedded whitespace characters.
	#[error("Scope contains whitespace: {scope}.")]
	ContainsWhitespace {
		/// The offending scope string.
		scope: String,
	},
}

/// Deduplicated, sorted set of OAuth scopes.
///
/// Two requests asking for the same scopes in a different order or with duplicates
/// produce equal sets and the same [`normalized`](Self::normalized) string, which is what
/// the client token cache keys on. Serialized as the space-delimited string.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeSet(Arc<[String]>);
impl ScopeSet {
	/// Creates a normalized scope set from any iterator.
	pub fn new<I, S>(scopes: I) -> Result<Self, ScopeValidationError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut set = BTreeSet::new();

		for scope in scopes {
			let owned: String = scope.into();

			if owned.is_empty() {
				return Err(ScopeValidationError::Empty);
			}
			if owned.chars().any(char::is_whitespace) {
				return Err(ScopeValidationError::ContainsWhitespace { scope: owned });
			}

			set.insert(owned);
		}

		Ok(Self(set.into_iter().collect()))
	}

	/// Parses scopes joined by `delimiter`, ignoring empty segments.
	pub fn from_delimited(raw: &str, delimiter: char) -> Result<Self, ScopeValidationError> {
		Self::new(raw.split(delimiter).map(str::trim).filter(|s| !s.is_empty()))
	}

	/// Number of distinct scopes.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns true if no scopes are defined.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Returns true if the set contains `scope`.
	pub fn contains(&self, scope: &str) -> bool {
		self.0.binary_search_by(|candidate| candidate.as_str().cmp(scope)).is_ok()
	}

	/// Iterator over normalized scopes.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}

	/// Space-delimited normalized representation.
	pub fn normalized(&self) -> String {
		self.joined(' ')
	}

	/// Normalized representation joined with a provider-specific delimiter.
	pub fn joined(&self, delimiter: char) -> String {
		let mut out = String::new();

		for (i, scope) in self.0.iter().enumerate() {
			if i > 0 {
				out.push(delimiter);
			}

			out.push_str(scope);
		}

		out
	}
}
impl Debug for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("ScopeSet").field(&self.0).finish()
	}
}
impl Display for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.normalized())
	}
}
impl FromStr for ScopeSet {
	type Err = ScopeValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.is_empty() {
			return Ok(Self::default());
		}
		if s.chars().all(char::is_whitespace) {
			return Err(ScopeValidationError::Empty);
		}

		Self::new(s.split_whitespace())
	}
}
impl Serialize for ScopeSet {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.normalized())
	}
}
impl<'de> Deserialize<'de> for ScopeSet {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;

		ScopeSet::from_str(&raw).map_err(DeError::custom)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn order_and_duplicates_do_not_matter() {
		let lhs = ScopeSet::new(["api.write", "api.read", "api.read"])
			.expect("Left-hand scope set should be valid.");
		let rhs = ScopeSet::from_str("api.read api.write")
			.expect("Right-hand scope set should be valid.");

		assert_eq!(lhs, rhs);
		assert_eq!(lhs.normalized(), "api.read api.write");
		assert_eq!(lhs.len(), 2);
		assert!(lhs.contains("api.write"));
		assert!(!lhs.contains("api"));
	}

	#[test]
	fn invalid_entries_are_rejected() {
		assert_eq!(ScopeSet::new([""]), Err(ScopeValidationError::Empty));
		assert!(matches!(
			ScopeSet::new(["two words"]),
			Err(ScopeValidationError::ContainsWhitespace { .. })
		));
		assert!(ScopeSet::from_str("").is_ok_and(|set| set.is_empty()));
		assert!(ScopeSet::from_str("   ").is_err());
	}

	#[test]
	fn delimiters_round_trip() {
		let set = ScopeSet::from_delimited("b,a, c,,", ',')
			.expect("Comma-delimited scopes should parse.");

		assert_eq!(set.joined(','), "a,b,c");
		assert_eq!(set.iter().collect::<Vec<_>>(), ["a", "b", "c"]);
	}

	#[test]
	fn serializes_as_normalized_string() {
		let set = ScopeSet::new(["profile", "email"]).expect("Scope fixture should be valid.");
		let payload = serde_json::to_string(&set).expect("ScopeSet should serialize.");

		assert_eq!(payload, "\"email profile\"");

		let back: ScopeSet = serde_json::from_str(&payload).expect("ScopeSet should deserialize.");

		assert_eq!(back, set);
	}
}

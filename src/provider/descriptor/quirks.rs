// self
use crate::_prelude::*;

/// Provider-specific formatting quirks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderQuirks {
	/// Character used to join scopes in the `scope` form field.
	pub scope_delimiter: char,
}
impl Default for ProviderQuirks {
	fn default() -> Self {
		Self { scope_delimiter: ' ' }
	}
}

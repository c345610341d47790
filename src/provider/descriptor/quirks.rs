// self
use crate::_prelude::*;

/// Provider-specific quirks that influence how the authorization URL is built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderQuirks {
	/// Character used to join scopes when constructing `scope` parameters.
	pub scope_delimiter: char,
	/// Additional query parameters appended to every authorization URL.
	pub extra_authorize_params: Vec<(String, String)>,
}
impl ProviderQuirks {
	/// Google's consent screen: request offline access and incremental authorization so the
	/// exchange yields a refresh token and keeps earlier grants.
	pub fn google() -> Self {
		Self {
			extra_authorize_params: vec![
				("access_type".into(), "offline".into()),
				("include_granted_scopes".into(), "true".into()),
			],
			..Default::default()
		}
	}
}
impl Default for ProviderQuirks {
	fn default() -> Self {
		Self { scope_delimiter: ' ', extra_authorize_params: Vec::new() }
	}
}

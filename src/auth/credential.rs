//! Immutable credential bundle produced by the code exchange and carried inside session tokens.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret},
};

/// Errors produced by [`CredentialBundleBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CredentialBundleBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no token endpoint was provided.
	#[error("Token endpoint is required.")]
	MissingTokenEndpoint,
	/// Issued when no client identifier was provided.
	#[error("Client identifier is required.")]
	MissingClientId,
	/// Issued when no client secret was provided.
	#[error("Client secret is required.")]
	MissingClientSecret,
}

/// Everything needed to call the calendar API as the consenting user (and to refresh later).
///
/// A bundle is created once, right after a successful code exchange, and never mutated. The
/// session token codec round-trips every field exactly.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialBundle {
	/// Provider access token; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh token, if the provider issued one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
	/// Token endpoint used to refresh the access token. Carried through, never invoked here.
	pub token_endpoint: Url,
	/// Registered application identifier.
	pub client_id: String,
	/// Registered application secret.
	pub client_secret: TokenSecret,
	/// Scopes granted by the provider.
	pub scopes: ScopeSet,
}
impl CredentialBundle {
	/// Returns a builder for assembling bundles.
	pub fn builder() -> CredentialBundleBuilder {
		CredentialBundleBuilder::default()
	}
}
impl Debug for CredentialBundle {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialBundle")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("token_endpoint", &self.token_endpoint.as_str())
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.field("scopes", &self.scopes)
			.finish()
	}
}

/// Builder for [`CredentialBundle`].
#[derive(Clone, Debug, Default)]
pub struct CredentialBundleBuilder {
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	token_endpoint: Option<Url>,
	client_id: Option<String>,
	client_secret: Option<TokenSecret>,
	scopes: ScopeSet,
}
impl CredentialBundleBuilder {
	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the refresh token when one is available.
	pub fn maybe_refresh_token(mut self, token: Option<impl Into<String>>) -> Self {
		self.refresh_token = token.map(TokenSecret::new);

		self
	}

	/// Sets the provider token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the registered client identifier.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Sets the registered client secret.
	pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(TokenSecret::new(secret));

		self
	}

	/// Sets the granted scopes.
	pub fn scopes(mut self, scopes: ScopeSet) -> Self {
		self.scopes = scopes;

		self
	}

	/// Consumes the builder and produces a [`CredentialBundle`].
	pub fn build(self) -> Result<CredentialBundle, CredentialBundleBuilderError> {
		let access_token = self
			.access_token
			.filter(|token| !token.is_empty())
			.ok_or(CredentialBundleBuilderError::MissingAccessToken)?;
		let token_endpoint =
			self.token_endpoint.ok_or(CredentialBundleBuilderError::MissingTokenEndpoint)?;
		let client_id = self
			.client_id
			.filter(|id| !id.is_empty())
			.ok_or(CredentialBundleBuilderError::MissingClientId)?;
		let client_secret =
			self.client_secret.ok_or(CredentialBundleBuilderError::MissingClientSecret)?;

		Ok(CredentialBundle {
			access_token,
			refresh_token: self.refresh_token,
			token_endpoint,
			client_id,
			client_secret,
			scopes: self.scopes,
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn endpoint() -> Url {
		Url::parse("https://oauth2.googleapis.com/token")
			.expect("Token endpoint fixture should parse successfully.")
	}

	#[test]
	fn builder_requires_core_fields() {
		let err = CredentialBundle::builder()
			.token_endpoint(endpoint())
			.client_id("client")
			.client_secret("secret")
			.build()
			.expect_err("Missing access token must be rejected.");

		assert_eq!(err, CredentialBundleBuilderError::MissingAccessToken);

		let err = CredentialBundle::builder()
			.access_token("access")
			.client_id("client")
			.client_secret("secret")
			.build()
			.expect_err("Missing token endpoint must be rejected.");

		assert_eq!(err, CredentialBundleBuilderError::MissingTokenEndpoint);

		let err = CredentialBundle::builder()
			.access_token("access")
			.token_endpoint(endpoint())
			.client_id("")
			.client_secret("secret")
			.build()
			.expect_err("Empty client id must be rejected.");

		assert_eq!(err, CredentialBundleBuilderError::MissingClientId);
	}

	#[test]
	fn refresh_token_is_optional() {
		let bundle = CredentialBundle::builder()
			.access_token("access")
			.maybe_refresh_token(None::<String>)
			.token_endpoint(endpoint())
			.client_id("client")
			.client_secret("secret")
			.build()
			.expect("Bundle without refresh token should build.");

		assert!(bundle.refresh_token.is_none());
		assert!(bundle.scopes.is_empty());

		let json = serde_json::to_value(&bundle).expect("Bundle should serialize.");

		assert!(json.get("refresh_token").is_none());
	}

	#[test]
	fn debug_output_redacts_secrets() {
		let bundle = CredentialBundle::builder()
			.access_token("ya29.visible?")
			.refresh_token("1//visible?")
			.token_endpoint(endpoint())
			.client_id("client")
			.client_secret("shh")
			.build()
			.expect("Bundle fixture should build.");
		let rendered = format!("{bundle:?}");

		assert!(!rendered.contains("ya29.visible?"));
		assert!(!rendered.contains("1//visible?"));
		assert!(!rendered.contains("shh"));
		assert!(rendered.contains("client"));
	}
}

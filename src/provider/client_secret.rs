//! Google Cloud console client secret files.
//!
//! The console hands out a JSON document with either a `web` or an `installed` section holding
//! the client credentials and the provider endpoints. Loading one yields both the client
//! credentials and a ready-to-use [`ProviderDescriptor`].

// std
use std::path::Path;
// self
use crate::{
	_prelude::*,
	auth::{ProviderId, TokenSecret},
	error::ConfigError,
	provider::{ClientAuthMethod, ProviderDescriptor, ProviderQuirks},
};

const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Deserialize)]
struct RawClientSecretFile {
	web: Option<RawSection>,
	installed: Option<RawSection>,
}

#[derive(Deserialize)]
struct RawSection {
	client_id: String,
	client_secret: TokenSecret,
	auth_uri: Option<Url>,
	token_uri: Option<Url>,
	#[serde(default)]
	redirect_uris: Vec<Url>,
	project_id: Option<String>,
}

/// Client credentials and endpoints read from a client secret file.
#[derive(Clone, Debug)]
pub struct ClientSecretFile {
	/// Registered application identifier.
	pub client_id: String,
	/// Registered application secret.
	pub client_secret: TokenSecret,
	/// Consent screen endpoint; Google's when the file omits it.
	pub auth_uri: Url,
	/// Token endpoint; Google's when the file omits it.
	pub token_uri: Url,
	/// Redirect URIs registered in the console.
	pub redirect_uris: Vec<Url>,
	/// Console project, informational only.
	pub project_id: Option<String>,
}
impl ClientSecretFile {
	/// Reads and parses the file at `path`.
	pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let raw = std::fs::read_to_string(path)
			.map_err(|source| ConfigError::ClientSecretRead { path: path.to_path_buf(), source })?;

		Self::from_json(&raw)
	}

	/// Parses a client secret document; a `web` section takes precedence over `installed`.
	pub fn from_json(json: &str) -> Result<Self, ConfigError> {
		let de = &mut serde_json::Deserializer::from_str(json);
		let raw: RawClientSecretFile = serde_path_to_error::deserialize(de)
			.map_err(|source| ConfigError::ClientSecretParse { source })?;
		let section = raw.web.or(raw.installed).ok_or(ConfigError::ClientSecretMissingSection)?;
		let auth_uri = match section.auth_uri {
			Some(url) => url,
			None => parse_default("auth_uri", GOOGLE_AUTH_URI)?,
		};
		let token_uri = match section.token_uri {
			Some(url) => url,
			None => parse_default("token_uri", GOOGLE_TOKEN_URI)?,
		};

		Ok(Self {
			client_id: section.client_id,
			client_secret: section.client_secret,
			auth_uri,
			token_uri,
			redirect_uris: section.redirect_uris,
			project_id: section.project_id,
		})
	}

	/// Builds the provider descriptor described by the file.
	pub fn descriptor(&self) -> Result<ProviderDescriptor, ConfigError> {
		let descriptor = ProviderDescriptor::builder(ProviderId::new("google")?)
			.authorization_endpoint(self.auth_uri.clone())
			.token_endpoint(self.token_uri.clone())
			.preferred_client_auth_method(ClientAuthMethod::ClientSecretPost)
			.quirks(ProviderQuirks::google())
			.build()?;

		Ok(descriptor)
	}

	/// First registered redirect URI, if any.
	pub fn default_redirect_uri(&self) -> Option<&Url> {
		self.redirect_uris.first()
	}
}

fn parse_default(field: &'static str, value: &str) -> Result<Url, ConfigError> {
	Url::parse(value).map_err(|source| ConfigError::InvalidUrl { field, source })
}

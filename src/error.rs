//! Broker-level error types shared across flows, providers, codecs, and stores.

// std
use std::path::PathBuf;
// self
use crate::_prelude::*;

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Session storage failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::session::SessionStoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure surfaced by the token endpoint.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Session token failed verification.
	#[error(transparent)]
	Token(#[from] crate::token::TokenError),
	/// Calendar API call failed.
	#[error(transparent)]
	Calendar(#[from] crate::calendar::CalendarError),

	/// Callback `state` does not match the value stored for the session.
	#[error("Authorization state mismatch.")]
	InvalidState,
	/// Provider rejected the grant (e.g., expired, reused, or mismatched code).
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
	/// Requested scopes were refused.
	#[error("Token lacks the required scopes: {reason}.")]
	InsufficientScope {
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
}
impl Error {
	/// Returns `true` when the identity provider refused the code-for-token exchange.
	pub fn is_upstream_exchange_failure(&self) -> bool {
		matches!(
			self,
			Self::InvalidGrant { .. } | Self::InvalidClient { .. } | Self::InsufficientScope { .. }
		)
	}

	/// Provider-facing detail for exchange failures, if this is one.
	pub fn exchange_reason(&self) -> Option<&str> {
		match self {
			Self::InvalidGrant { reason }
			| Self::InvalidClient { reason }
			| Self::InsufficientScope { reason } => Some(reason),
			_ => None,
		}
	}
}

/// Configuration and validation failures raised by the broker.
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
	/// Provider descriptor failed validation.
	#[error(transparent)]
	Descriptor(#[from] crate::provider::ProviderDescriptorError),
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// A configured URL cannot be parsed.
	#[error("The {field} URL is invalid.")]
	InvalidUrl {
		/// Configuration field that carried the URL.
		field: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// An identifier failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Requested or granted scopes cannot be normalized.
	#[error("Scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Credential bundle builder validation failed.
	#[error("Unable to build credential bundle.")]
	CredentialBuild(#[from] crate::auth::CredentialBundleBuilderError),
	/// Client secret file could not be read.
	#[error("Client secret file {} could not be read.", path.display())]
	ClientSecretRead {
		/// Path that failed to load.
		path: PathBuf,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Client secret file is not valid JSON in the expected shape.
	#[error("Client secret file is malformed.")]
	ClientSecretParse {
		/// Structured parsing failure, including the offending JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Client secret file contains neither a `web` nor an `installed` section.
	#[error("Client secret file must contain a `web` or `installed` section.")]
	ClientSecretMissingSection,
	/// A CORS origin is not a valid header value.
	#[error("Allowed origin {origin:?} is not a valid header value.")]
	InvalidOrigin {
		/// Origin as configured.
		origin: String,
	},
	/// Signing secret is too short to key HS256.
	#[error("Signing secret must be at least {min} bytes.")]
	WeakSigningSecret {
		/// Minimum accepted length in bytes.
		min: usize,
	},
	/// Session token could not be signed.
	#[error("Session token could not be signed.")]
	TokenSigning(#[source] jsonwebtoken::errors::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary upstream failures; surfaced to callers without retries.
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Provider returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Provider- or broker-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
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
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

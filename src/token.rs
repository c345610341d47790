//! Session token codec.
//!
//! [`SessionTokenCodec`] turns a [`CredentialBundle`] into an HS256-signed JWT whose claim set is
//! every bundle field plus `iat`/`exp`, and verifies such tokens back into bundles. Expiry is
//! checked against a caller-supplied clock so handlers and tests share one code path. Both
//! failure kinds stay distinguishable here; the HTTP layer collapses them into a single 401.

// crates.io
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
// self
use crate::{_prelude::*, auth::CredentialBundle, error::ConfigError};

/// Lifetime applied to freshly minted session tokens unless overridden.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::hours(1);

const MIN_SECRET_LEN: usize = 32;
const ALGORITHM: Algorithm = Algorithm::HS256;

/// Verification failures reported by [`SessionTokenCodec::decode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
pub enum TokenError {
	/// The embedded `exp` claim lies in the past.
	#[error("Session token has expired.")]
	Expired,
	/// Wrong secret, wrong algorithm, corrupted payload, or malformed structure.
	#[error("Session token signature or format is invalid.")]
	InvalidSignatureOrFormat,
}

/// Symmetric key shared by every codec in the process.
#[derive(Clone)]
pub struct SigningSecret(Arc<[u8]>);
impl SigningSecret {
	/// Wraps a configured secret, rejecting anything shorter than 32 bytes.
	pub fn new(value: impl AsRef<[u8]>) -> Result<Self, ConfigError> {
		let bytes = value.as_ref();

		if bytes.len() < MIN_SECRET_LEN {
			return Err(ConfigError::WeakSigningSecret { min: MIN_SECRET_LEN });
		}

		Ok(Self(Arc::from(bytes)))
	}

	/// Generates a random process-lifetime secret.
	///
	/// Restarting the process with a generated secret invalidates every outstanding token.
	pub fn generate() -> Self {
		let mut bytes = [0_u8; MIN_SECRET_LEN];

		rand::rng().fill(&mut bytes);

		Self(Arc::from(bytes.as_slice()))
	}

	fn expose(&self) -> &[u8] {
		&self.0
	}
}
impl Debug for SigningSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("SigningSecret(<redacted>)")
	}
}

/// Verified contents of a session token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionClaims {
	/// Reconstructed credential bundle.
	pub bundle: CredentialBundle,
	/// Instant the token was minted (second precision).
	pub issued_at: OffsetDateTime,
	/// Instant after which the token is rejected (second precision).
	pub expires_at: OffsetDateTime,
}

#[derive(Serialize)]
struct OutgoingClaims<'a> {
	iat: i64,
	exp: i64,
	#[serde(flatten)]
	bundle: &'a CredentialBundle,
}

#[derive(Deserialize)]
struct IncomingClaims {
	iat: i64,
	exp: i64,
	#[serde(flatten)]
	bundle: CredentialBundle,
}

/// Encodes credential bundles into signed bearer tokens and verifies them back.
#[derive(Clone)]
pub struct SessionTokenCodec {
	encoding_key: EncodingKey,
	decoding_key: DecodingKey,
	validation: Validation,
	ttl: Duration,
}
impl SessionTokenCodec {
	/// Creates a codec keyed by `secret` with the default one hour lifetime.
	pub fn new(secret: SigningSecret) -> Self {
		let mut validation = Validation::new(ALGORITHM);

		// Expiry is enforced against the caller's clock in `decode_claims`.
		validation.validate_exp = false;
		validation.validate_aud = false;
		validation.set_required_spec_claims(&["exp"]);

		Self {
			encoding_key: EncodingKey::from_secret(secret.expose()),
			decoding_key: DecodingKey::from_secret(secret.expose()),
			validation,
			ttl: DEFAULT_TOKEN_TTL,
		}
	}

	/// Overrides the token lifetime; non-positive values fall back to the default.
	pub fn with_ttl(mut self, ttl: Duration) -> Self {
		self.ttl = if ttl.is_positive() { ttl } else { DEFAULT_TOKEN_TTL };

		self
	}

	/// Lifetime stamped into every new token.
	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	/// Signs `bundle` into a token that expires `ttl` after `now`.
	pub fn encode(&self, bundle: &CredentialBundle, now: OffsetDateTime) -> Result<String> {
		let iat = now.unix_timestamp();
		let claims = OutgoingClaims { iat, exp: iat + self.ttl.whole_seconds(), bundle };

		jsonwebtoken::encode(&Header::new(ALGORITHM), &claims, &self.encoding_key)
			.map_err(|e| ConfigError::TokenSigning(e).into())
	}

	/// Verifies `token` at `now` and returns the embedded bundle.
	pub fn decode(&self, token: &str, now: OffsetDateTime) -> Result<CredentialBundle, TokenError> {
		self.decode_claims(token, now).map(|claims| claims.bundle)
	}

	/// Verifies `token` at `now` and returns the bundle together with its timing claims.
	pub fn decode_claims(
		&self,
		token: &str,
		now: OffsetDateTime,
	) -> Result<SessionClaims, TokenError> {
		let data =
			jsonwebtoken::decode::<IncomingClaims>(token, &self.decoding_key, &self.validation)
				.map_err(|e| {
					tracing::debug!(kind = ?e.kind(), "session token failed verification");

					TokenError::InvalidSignatureOrFormat
				})?;
		let IncomingClaims { iat, exp, bundle } = data.claims;
		let issued_at = OffsetDateTime::from_unix_timestamp(iat)
			.map_err(|_| TokenError::InvalidSignatureOrFormat)?;
		let expires_at = OffsetDateTime::from_unix_timestamp(exp)
			.map_err(|_| TokenError::InvalidSignatureOrFormat)?;

		if now.unix_timestamp() > exp {
			return Err(TokenError::Expired);
		}

		Ok(SessionClaims { bundle, issued_at, expires_at })
	}
}
impl Debug for SessionTokenCodec {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionTokenCodec").field("ttl", &self.ttl).finish()
	}
}

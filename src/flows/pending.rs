// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret},
	provider::ProviderDescriptor,
};

const STATE_LEN: usize = 32;
const PKCE_VERIFIER_LEN: usize = 64;

/// Supported PKCE challenge methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// Per-session record written when the consent redirect is issued.
///
/// Stored server-side under the browser's session id and consumed by the callback.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
	/// Opaque state value that must round-trip via the provider redirect.
	pub state: String,
	/// Redirect URI placed in the authorize URL; repeated verbatim at exchange time.
	pub redirect_uri: Url,
	/// Scopes requested in the authorize URL.
	pub scopes: ScopeSet,
	/// Instant the redirect was issued.
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	pkce_verifier: TokenSecret,
}
impl PendingAuthorization {
	pub(crate) fn new(
		state: impl Into<String>,
		pkce_verifier: impl Into<String>,
		redirect_uri: Url,
		scopes: ScopeSet,
		created_at: OffsetDateTime,
	) -> Self {
		Self {
			state: state.into(),
			redirect_uri,
			scopes,
			created_at,
			pkce_verifier: TokenSecret::new(pkce_verifier),
		}
	}

	/// Returns `true` once more than `ttl` has elapsed since the redirect was issued.
	pub fn is_expired(&self, now: OffsetDateTime, ttl: Duration) -> bool {
		now - self.created_at > ttl
	}

	pub(crate) fn pkce_verifier(&self) -> &str {
		self.pkce_verifier.expose()
	}
}
impl Debug for PendingAuthorization {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PendingAuthorization")
			.field("state", &self.state)
			.field("redirect_uri", &self.redirect_uri.as_str())
			.field("scopes", &self.scopes)
			.field("created_at", &self.created_at)
			.field("pkce_verifier", &"<redacted>")
			.finish()
	}
}

/// Consent redirect produced by [`AuthorizationCoordinator::begin_authorization`].
///
/// [`AuthorizationCoordinator::begin_authorization`]: crate::flows::AuthorizationCoordinator::begin_authorization
#[derive(Clone, Debug)]
pub struct AuthorizationRequest {
	/// Fully-formed authorize URL that the user agent should be redirected to.
	pub authorize_url: Url,
	/// State value embedded in `authorize_url`.
	pub state: String,
	/// Record the caller must persist for the session before redirecting.
	pub pending: PendingAuthorization,
}

#[derive(Clone)]
pub(super) struct PkcePair {
	pub(super) verifier: String,
	pub(super) challenge: String,
	pub(super) method: PkceCodeChallengeMethod,
}
impl PkcePair {
	pub(super) fn generate() -> Self {
		let verifier = random_string(PKCE_VERIFIER_LEN);
		let challenge = compute_pkce_challenge(&verifier);

		Self { verifier, challenge, method: PkceCodeChallengeMethod::S256 }
	}
}

pub(super) fn build_request(
	descriptor: &ProviderDescriptor,
	client_id: &str,
	redirect_uri: Url,
	scopes: ScopeSet,
	now: OffsetDateTime,
) -> AuthorizationRequest {
	let state = random_string(STATE_LEN);
	let pkce = PkcePair::generate();
	let authorize_url =
		build_authorize_url(descriptor, client_id, &redirect_uri, &scopes, &state, &pkce);
	let pending =
		PendingAuthorization::new(state.clone(), pkce.verifier, redirect_uri, scopes, now);

	AuthorizationRequest { authorize_url, state, pending }
}

fn build_authorize_url(
	descriptor: &ProviderDescriptor,
	client_id: &str,
	redirect_uri: &Url,
	scopes: &ScopeSet,
	state: &str,
	pkce: &PkcePair,
) -> Url {
	let mut url = descriptor.endpoints.authorization.clone();
	let mut pairs = url.query_pairs_mut();

	pairs.append_pair("response_type", "code");
	pairs.append_pair("client_id", client_id);
	pairs.append_pair("redirect_uri", redirect_uri.as_str());

	if let Some(scope_value) = scopes.join_with(descriptor.quirks.scope_delimiter) {
		pairs.append_pair("scope", &scope_value);
	}

	pairs.append_pair("state", state);
	pairs.append_pair("code_challenge", &pkce.challenge);
	pairs.append_pair("code_challenge_method", pkce.method.as_str());

	for (name, value) in &descriptor.quirks.extra_authorize_params {
		pairs.append_pair(name, value);
	}

	drop(pairs);

	url
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

fn compute_pkce_challenge(verifier: &str) -> String {
	URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::{test_descriptor, test_pending},
		provider::ProviderQuirks,
	};

	#[test]
	fn pkce_challenge_matches_rfc_7636_vector() {
		assert_eq!(
			compute_pkce_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
			"E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
		);

		let pair = PkcePair::generate();

		assert_eq!(pair.verifier.len(), PKCE_VERIFIER_LEN);
		assert_eq!(pair.challenge, compute_pkce_challenge(&pair.verifier));
	}

	#[test]
	fn authorize_url_carries_every_parameter() {
		let mut descriptor = test_descriptor("https://accounts.example.com");

		descriptor.quirks = ProviderQuirks::google();

		let redirect =
			Url::parse("http://localhost:8000/oauthcallback").expect("Redirect fixture should parse.");
		let scopes = ScopeSet::new(["email", "openid"]).expect("Scope fixture should be valid.");
		let now = OffsetDateTime::now_utc();
		let request = build_request(&descriptor, "client-1", redirect.clone(), scopes.clone(), now);
		let pairs: HashMap<_, _> = request.authorize_url.query_pairs().into_owned().collect();

		assert_eq!(request.state.len(), STATE_LEN);
		assert_eq!(request.pending.state, request.state);
		assert_eq!(request.pending.scopes, scopes);
		assert_eq!(request.pending.created_at, now);
		assert_eq!(pairs.get("response_type"), Some(&"code".into()));
		assert_eq!(pairs.get("client_id"), Some(&"client-1".into()));
		assert_eq!(pairs.get("redirect_uri"), Some(&redirect.as_str().into()));
		assert_eq!(pairs.get("scope"), Some(&"email openid".into()));
		assert_eq!(pairs.get("state"), Some(&request.state));
		assert_eq!(pairs.get("code_challenge_method"), Some(&"S256".into()));
		assert_eq!(
			pairs.get("code_challenge"),
			Some(&compute_pkce_challenge(request.pending.pkce_verifier()))
		);
		assert_eq!(pairs.get("access_type"), Some(&"offline".into()));
		assert_eq!(pairs.get("include_granted_scopes"), Some(&"true".into()));
	}

	#[test]
	fn states_are_unguessable_and_distinct() {
		let descriptor = test_descriptor("https://accounts.example.com");
		let redirect = Url::parse("https://app.example.com/cb").expect("Redirect should parse.");
		let now = OffsetDateTime::now_utc();
		let first =
			build_request(&descriptor, "client", redirect.clone(), ScopeSet::default(), now);
		let second = build_request(&descriptor, "client", redirect, ScopeSet::default(), now);

		assert_ne!(first.state, second.state);
		assert!(first.state.chars().all(|c| c.is_ascii_alphanumeric()));
		assert!(!first.authorize_url.query_pairs().any(|(key, _)| key == "scope"));
	}

	#[test]
	fn pending_authorizations_expire_after_ttl() {
		let pending = test_pending("state");
		let created = pending.created_at;

		assert!(!pending.is_expired(created + Duration::minutes(10), Duration::minutes(10)));
		assert!(pending.is_expired(
			created + Duration::minutes(10) + Duration::seconds(1),
			Duration::minutes(10)
		));
	}

	#[test]
	fn serialized_form_keeps_verifier_but_debug_hides_it() {
		let pending = test_pending("state");
		let json = serde_json::to_string(&pending).expect("Pending authorization should serialize.");
		let back: PendingAuthorization =
			serde_json::from_str(&json).expect("Pending authorization should deserialize.");

		assert_eq!(back, pending);
		assert!(!format!("{pending:?}").contains(pending.pkce_verifier()));
	}
}

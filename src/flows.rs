//! Authorization Code + PKCE coordination against a single provider.
//!
//! [`AuthorizationCoordinator::begin_authorization`] builds the consent redirect together with
//! a [`PendingAuthorization`] the caller stores for the browser session. The callback side
//! ([`AuthorizationCoordinator::complete_authorization`] or
//! [`AuthorizationCoordinator::complete_with_code`]) checks the returned `state` against that
//! record before any network call, then redeems the code and assembles the
//! [`CredentialBundle`].

/// Pending authorization records and PKCE helpers.
pub mod pending;

pub use pending::*;

// self
use crate::{
	_prelude::*,
	auth::{CredentialBundle, ScopeSet, TokenSecret},
	error::ConfigError,
	http::BrokerHttpClient,
	oauth::BasicFacade,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::{ProviderDescriptor, ProviderStrategy},
};

/// Default lifetime of a pending authorization.
pub const DEFAULT_PENDING_TTL: Duration = Duration::minutes(10);

/// Drives the redirect to the identity provider and handles its callback.
#[derive(Clone)]
pub struct AuthorizationCoordinator {
	descriptor: ProviderDescriptor,
	strategy: Arc<dyn ProviderStrategy>,
	client_id: String,
	client_secret: TokenSecret,
	redirect_uri: Url,
	scopes: ScopeSet,
	http_client: BrokerHttpClient,
	pending_ttl: Duration,
}
impl AuthorizationCoordinator {
	/// Creates a coordinator for one registered client.
	pub fn new(
		descriptor: ProviderDescriptor,
		strategy: Arc<dyn ProviderStrategy>,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		redirect_uri: Url,
		scopes: ScopeSet,
		http_client: BrokerHttpClient,
	) -> Self {
		Self {
			descriptor,
			strategy,
			client_id: client_id.into(),
			client_secret: TokenSecret::new(client_secret),
			redirect_uri,
			scopes,
			http_client,
			pending_ttl: DEFAULT_PENDING_TTL,
		}
	}

	/// Overrides how long a pending authorization stays redeemable.
	pub fn with_pending_ttl(mut self, ttl: Duration) -> Self {
		self.pending_ttl = ttl;

		self
	}

	/// Provider descriptor in use.
	pub fn descriptor(&self) -> &ProviderDescriptor {
		&self.descriptor
	}

	/// Redirect URI registered with the provider.
	pub fn redirect_uri(&self) -> &Url {
		&self.redirect_uri
	}

	/// Scopes requested on every authorization.
	pub fn scopes(&self) -> &ScopeSet {
		&self.scopes
	}

	/// Lifetime of pending authorizations.
	pub fn pending_ttl(&self) -> Duration {
		self.pending_ttl
	}

	/// Builds the consent redirect with a fresh state value and PKCE pair.
	pub fn begin_authorization(&self) -> AuthorizationRequest {
		const KIND: FlowKind = FlowKind::Authorize;

		let _span = FlowSpan::new(KIND, "begin_authorization").entered();

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let request = pending::build_request(
			&self.descriptor,
			&self.client_id,
			self.redirect_uri.clone(),
			self.scopes.clone(),
			OffsetDateTime::now_utc(),
		);

		tracing::info!(provider = %self.descriptor.id, "issued consent redirect");
		obs::record_flow_outcome(KIND, FlowOutcome::Success);

		request
	}

	/// Validates the provider callback and exchanges its code for a credential bundle.
	///
	/// `callback_url` is the full redirect the provider sent the user agent to; its `code`
	/// parameter is redeemed and an `error` parameter aborts the flow.
	pub async fn complete_authorization(
		&self,
		received_state: &str,
		session_state: Option<&PendingAuthorization>,
		callback_url: &Url,
	) -> Result<CredentialBundle> {
		self.complete(received_state, session_state, "complete_authorization", || {
			code_from_callback(callback_url)
		})
		.await
	}

	/// Same as [`complete_authorization`](Self::complete_authorization) with the code supplied
	/// directly.
	pub async fn complete_with_code(
		&self,
		received_state: &str,
		session_state: Option<&PendingAuthorization>,
		code: &str,
	) -> Result<CredentialBundle> {
		self.complete(received_state, session_state, "complete_with_code", || {
			if code.is_empty() { Err(missing_code()) } else { Ok(code.to_owned()) }
		})
		.await
	}

	async fn complete<F>(
		&self,
		received_state: &str,
		session_state: Option<&PendingAuthorization>,
		stage: &'static str,
		code: F,
	) -> Result<CredentialBundle>
	where
		F: FnOnce() -> Result<String>,
	{
		const KIND: FlowKind = FlowKind::Callback;

		let span = FlowSpan::new(KIND, stage);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let pending = self.verify_state(received_state, session_state)?;
				let code = code()?;

				self.exchange(pending, &code).await
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(e) => {
				tracing::warn!(error = %e, "authorization callback failed");
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		result
	}

	fn verify_state<'a>(
		&self,
		received_state: &str,
		session_state: Option<&'a PendingAuthorization>,
	) -> Result<&'a PendingAuthorization> {
		let pending = session_state.ok_or(Error::InvalidState)?;

		if received_state.is_empty() || received_state != pending.state {
			return Err(Error::InvalidState);
		}
		if pending.is_expired(OffsetDateTime::now_utc(), self.pending_ttl) {
			tracing::debug!("pending authorization expired");

			return Err(Error::InvalidState);
		}

		Ok(pending)
	}

	async fn exchange(
		&self,
		pending: &PendingAuthorization,
		code: &str,
	) -> Result<CredentialBundle> {
		let facade = BasicFacade::from_descriptor(
			&self.descriptor,
			&self.client_id,
			self.client_secret.expose(),
			self.http_client.clone(),
		)?;
		let tokens = facade
			.exchange_authorization_code(
				self.strategy.as_ref(),
				code,
				pending.pkce_verifier(),
				&pending.redirect_uri,
			)
			.await?;
		let scopes = tokens.scopes.unwrap_or_else(|| pending.scopes.clone());

		CredentialBundle::builder()
			.access_token(tokens.access_token)
			.maybe_refresh_token(tokens.refresh_token)
			.token_endpoint(self.descriptor.endpoints.token.clone())
			.client_id(self.client_id.as_str())
			.client_secret(self.client_secret.expose())
			.scopes(scopes)
			.build()
			.map_err(|e| ConfigError::from(e).into())
	}
}
impl Debug for AuthorizationCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationCoordinator")
			.field("descriptor", &self.descriptor)
			.field("client_id", &self.client_id)
			.field("redirect_uri", &self.redirect_uri.as_str())
			.field("scopes", &self.scopes)
			.field("pending_ttl", &self.pending_ttl)
			.finish()
	}
}

fn code_from_callback(callback_url: &Url) -> Result<String> {
	let mut code = None;
	let mut error = None;
	let mut description = None;

	for (key, value) in callback_url.query_pairs() {
		match key.as_ref() {
			"code" => code = Some(value.into_owned()),
			"error" => error = Some(value.into_owned()),
			"error_description" => description = Some(value.into_owned()),
			_ => {},
		}
	}

	if let Some(error) = error {
		let reason = match description {
			Some(description) => format!("({error}) {description}"),
			None => format!("({error})"),
		};

		return Err(Error::InvalidGrant { reason });
	}

	code.filter(|code| !code.is_empty()).ok_or_else(missing_code)
}

fn missing_code() -> Error {
	Error::InvalidGrant { reason: "Authorization response is missing the code parameter".into() }
}

//! Internal OAuth client facade over the `oauth2` crate.

pub use oauth2;

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, PkceCodeVerifier, RedirectUrl, RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	auth::ScopeSet,
	error::{ConfigError, TransientError, TransportError},
	http::{BrokerHttpClient, ResponseMetadata, ResponseMetadataSlot},
	provider::{
		ClientAuthMethod, ProviderDescriptor, ProviderErrorContext, ProviderErrorKind,
		ProviderStrategy,
	},
};

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Raw outcome of a successful code exchange.
#[derive(Clone)]
pub(crate) struct ExchangedTokens {
	pub(crate) access_token: String,
	pub(crate) refresh_token: Option<String>,
	/// Scopes echoed by the provider; `None` when the response omits `scope`.
	pub(crate) scopes: Option<ScopeSet>,
}
impl Debug for ExchangedTokens {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ExchangedTokens")
			.field("refresh_token_present", &self.refresh_token.is_some())
			.field("scopes", &self.scopes)
			.finish()
	}
}

pub(crate) struct BasicFacade {
	oauth_client: ConfiguredBasicClient,
	http_client: BrokerHttpClient,
}
impl BasicFacade {
	pub(crate) fn from_descriptor(
		descriptor: &ProviderDescriptor,
		client_id: &str,
		client_secret: &str,
		http_client: BrokerHttpClient,
	) -> Result<Self> {
		let auth_url = AuthUrl::new(descriptor.endpoints.authorization.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let token_url = TokenUrl::new(descriptor.endpoints.token.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let mut oauth_client = BasicClient::new(ClientId::new(client_id.to_owned()))
			.set_client_secret(ClientSecret::new(client_secret.to_owned()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url);

		if matches!(descriptor.preferred_client_auth_method, ClientAuthMethod::ClientSecretPost) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Ok(Self { oauth_client, http_client })
	}

	/// Redeems `code` at the token endpoint, presenting the PKCE verifier and redirect URI.
	pub(crate) fn exchange_authorization_code<'a>(
		&'a self,
		strategy: &'a dyn ProviderStrategy,
		code: &'a str,
		pkce_verifier: &'a str,
		redirect_uri: &'a Url,
	) -> FacadeFuture<'a, ExchangedTokens> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.instrumented(meta.clone());
			let redirect_url = RedirectUrl::new(redirect_uri.to_string())
				.map_err(|source| ConfigError::InvalidRedirect { source })?;
			let mut form = BTreeMap::new();

			strategy.augment_token_request(&mut form);

			let mut request = self
				.oauth_client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_owned()))
				.set_redirect_uri(Cow::Owned(redirect_url));

			for (key, value) in form {
				request = request.add_extra_param(key, value);
			}

			let response = request
				.request_async(&instrumented)
				.await
				.map_err(|err| map_request_error(strategy, meta.take(), err))?;
			let scopes = response
				.scopes()
				.map(|scopes| ScopeSet::new(scopes.iter().map(|scope| scope.as_ref())))
				.transpose()
				.map_err(ConfigError::from)?;

			Ok(ExchangedTokens {
				access_token: response.access_token().secret().to_owned(),
				refresh_token: response.refresh_token().map(|token| token.secret().to_owned()),
				scopes,
			})
		})
	}
}

fn map_request_error(
	strategy: &dyn ProviderStrategy,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<ReqwestError>>,
) -> Error {
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(strategy, response, meta_ref),
		RequestTokenError::Request(error) => map_transport_error(meta_ref, error),
		RequestTokenError::Parse(source, body) => match meta_status(meta_ref) {
			Some(status @ 400..=499) => {
				let ctx = ProviderErrorContext::new()
					.with_http_status(status)
					.with_body_preview(String::from_utf8_lossy(&body));
				let reason = ctx.body_preview.clone().unwrap_or_default();

				classified_error(strategy.classify_token_error(&ctx), reason, meta_ref)
			},
			status => TransientError::TokenResponseParse { source, status }.into(),
		},
		RequestTokenError::Other(message) => TransientError::TokenEndpoint {
			message: format!("Token endpoint returned an unexpected response: {message}"),
			status: meta_status(meta_ref),
		}
		.into(),
	}
}

fn map_server_response_error(
	strategy: &dyn ProviderStrategy,
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let code = response.error().as_ref().to_string();
	let mut ctx = ProviderErrorContext::new().with_oauth_error(code.clone());

	if let Some(description) = response.error_description() {
		ctx = ctx.with_error_description(description.clone());
	}
	if let Some(status) = meta_status(meta) {
		ctx = ctx.with_http_status(status);
	}

	let reason = match response.error_description() {
		Some(description) => format!("({code}) {description}"),
		None => format!("({code})"),
	};

	classified_error(strategy.classify_token_error(&ctx), reason, meta)
}

fn classified_error(
	kind: ProviderErrorKind,
	reason: String,
	meta: Option<&ResponseMetadata>,
) -> Error {
	match kind {
		ProviderErrorKind::InvalidGrant => Error::InvalidGrant { reason },
		ProviderErrorKind::InvalidClient => Error::InvalidClient { reason },
		ProviderErrorKind::InsufficientScope => Error::InsufficientScope { reason },
		ProviderErrorKind::Transient =>
			TransientError::TokenEndpoint { message: reason, status: meta_status(meta) }.into(),
	}
}

fn map_transport_error(
	meta: Option<&ResponseMetadata>,
	err: HttpClientError<ReqwestError>,
) -> Error {
	match err {
		HttpClientError::Reqwest(inner) => map_reqwest_error(meta, *inner),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransientError::TokenEndpoint {
			message: format!("HTTP client error while calling the token endpoint: {message}"),
			status: meta_status(meta),
		}
		.into(),
		_ => TransientError::TokenEndpoint {
			message: "HTTP client error while calling the token endpoint".into(),
			status: meta_status(meta),
		}
		.into(),
	}
}

fn map_reqwest_error(meta: Option<&ResponseMetadata>, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::TokenEndpoint {
			message: "Request timed out while calling the token endpoint".into(),
			status: meta_status(meta).or_else(|| err.status().map(|code| code.as_u16())),
		}
		.into();
	}

	TransportError::from(err).into()
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

#[cfg(test)]
mod tests {
	// crates.io
	use httpmock::prelude::*;
	// self
	use super::*;
	use crate::{
		_preludet::{test_descriptor, test_http_client},
		provider::DefaultProviderStrategy,
	};

	fn redirect() -> Url {
		Url::parse("http://localhost:8000/oauthcallback").expect("Redirect fixture should parse.")
	}

	#[derive(Debug)]
	struct AudienceStrategy;
	impl ProviderStrategy for AudienceStrategy {
		fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
			DefaultProviderStrategy.classify_token_error(ctx)
		}

		fn augment_token_request(&self, form: &mut BTreeMap<String, String>) {
			form.insert("audience".into(), "calendar".into());
		}
	}

	#[tokio::test]
	async fn exchange_sends_verifier_and_strategy_params() {
		let server = MockServer::start_async().await;
		let mock = server
			.mock_async(|when, then| {
				when.method(POST)
					.path("/token")
					.form_urlencoded_tuple("grant_type", "authorization_code")
					.form_urlencoded_tuple("code", "code-1")
					.form_urlencoded_tuple("code_verifier", "verifier-1")
					.form_urlencoded_tuple("audience", "calendar")
					.form_urlencoded_tuple("client_secret", "secret");
				then.status(200).header("content-type", "application/json").body(
					"{\"access_token\":\"access-1\",\"token_type\":\"Bearer\",\"expires_in\":3599,\"refresh_token\":\"refresh-1\",\"scope\":\"openid email\"}",
				);
			})
			.await;
		let facade = BasicFacade::from_descriptor(
			&test_descriptor(&server.base_url()),
			"client",
			"secret",
			test_http_client(),
		)
		.expect("Facade should build.");
		let redirect = redirect();
		let tokens = facade
			.exchange_authorization_code(&AudienceStrategy, "code-1", "verifier-1", &redirect)
			.await
			.expect("Exchange should succeed.");

		mock.assert_async().await;

		assert_eq!(tokens.access_token, "access-1");
		assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-1"));
		assert_eq!(
			tokens.scopes,
			Some(ScopeSet::new(["email", "openid"]).expect("Scope fixture should be valid."))
		);
	}

	#[tokio::test]
	async fn html_error_bodies_are_classified_by_status() {
		let server = MockServer::start_async().await;
		let _mock = server
			.mock_async(|when, then| {
				when.method(POST).path("/token");
				then.status(401).header("content-type", "text/html").body("<h1>nope</h1>");
			})
			.await;
		let facade = BasicFacade::from_descriptor(
			&test_descriptor(&server.base_url()),
			"client",
			"secret",
			test_http_client(),
		)
		.expect("Facade should build.");
		let redirect = redirect();
		let err = facade
			.exchange_authorization_code(&DefaultProviderStrategy, "code", "verifier", &redirect)
			.await
			.expect_err("HTML error must fail.");

		assert!(matches!(err, Error::InvalidClient { .. }), "Unexpected error: {err:?}.");
	}

	#[tokio::test]
	async fn server_errors_are_transient() {
		let server = MockServer::start_async().await;
		let _mock = server
			.mock_async(|when, then| {
				when.method(POST).path("/token");
				then.status(503)
					.header("content-type", "application/json")
					.body("{\"error\":\"temporarily_unavailable\"}");
			})
			.await;
		let facade = BasicFacade::from_descriptor(
			&test_descriptor(&server.base_url()),
			"client",
			"secret",
			test_http_client(),
		)
		.expect("Facade should build.");
		let redirect = redirect();
		let err = facade
			.exchange_authorization_code(&DefaultProviderStrategy, "code", "verifier", &redirect)
			.await
			.expect_err("Unavailable provider must fail.");

		assert!(
			matches!(err, Error::Transient(TransientError::TokenEndpoint { status: Some(503), .. })),
			"Unexpected error: {err:?}."
		);
	}

	#[derive(Debug)]
	struct UnreachableStrategy;
	impl ProviderStrategy for UnreachableStrategy {
		fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
			panic!("Transport failures must not be classified: {ctx:?}.");
		}
	}

	#[tokio::test]
	async fn connection_failures_bypass_the_strategy() {
		let port = std::net::TcpListener::bind("127.0.0.1:0")
			.and_then(|listener| listener.local_addr())
			.expect("Failed to reserve a local port.")
			.port();
		let facade = BasicFacade::from_descriptor(
			&test_descriptor(&format!("http://127.0.0.1:{port}")),
			"client",
			"secret",
			test_http_client(),
		)
		.expect("Facade should build.");
		let redirect = redirect();
		let err = facade
			.exchange_authorization_code(&UnreachableStrategy, "code", "verifier", &redirect)
			.await
			.expect_err("Closed port must fail.");

		assert!(matches!(err, Error::Transport(_)), "Unexpected error: {err:?}.");
	}
}

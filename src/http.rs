//! Shared HTTP transport for the token exchange and calendar calls.
//!
//! [`BrokerHttpClient`] wraps one reqwest client for the whole process. The token exchange
//! borrows it through [`InstrumentedHandle`], an [`AsyncHttpClient`] adapter that records the
//! HTTP status in a [`ResponseMetadataSlot`] so provider failures can be classified with the
//! status attached even after `oauth2` has consumed the response.

// std
use std::ops::Deref;
// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
use reqwest::redirect::Policy;
// self
use crate::{_prelude::*, error::ConfigError};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Captures metadata from the most recent token endpoint response.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the token endpoint, if available.
	pub status: Option<u16>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Token endpoints must answer directly, so the default client never follows redirects.
/// Custom clients passed through [`BrokerHttpClient::with_client`] should do the same.
#[derive(Clone, Debug)]
pub struct BrokerHttpClient(pub ReqwestClient);
impl BrokerHttpClient {
	/// Builds the default client: rustls, no redirects, crate user agent.
	pub fn new() -> Result<Self, ConfigError> {
		let client =
			ReqwestClient::builder().redirect(Policy::none()).user_agent(USER_AGENT).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds an [`AsyncHttpClient`] handle that records outcomes in `slot`.
	pub(crate) fn instrumented(&self, slot: ResponseMetadataSlot) -> InstrumentedHandle {
		InstrumentedHandle(Arc::new(InstrumentedHttpClient { client: self.0.clone(), slot }))
	}
}
impl AsRef<ReqwestClient> for BrokerHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for BrokerHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

struct InstrumentedHttpClient {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}

/// Handle passed to `oauth2` request builders; shares the slot with the facade.
#[derive(Clone)]
pub(crate) struct InstrumentedHandle(Arc<InstrumentedHttpClient>);
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = Arc::clone(&self.0);

		Box::pin(async move {
			client.slot.take();

			let response = client
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();

			client.slot.store(ResponseMetadata { status: Some(status.as_u16()) });

			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use httpmock::prelude::*;
	// self
	use super::*;
	use crate::_preludet::test_http_client;

	#[tokio::test]
	async fn instrumented_handle_records_status() {
		let server = MockServer::start_async().await;
		let mock = server
			.mock_async(|when, then| {
				when.method(POST).path("/token");
				then.status(418).body("teapot");
			})
			.await;
		let slot = ResponseMetadataSlot::default();
		let handle = test_http_client().instrumented(slot.clone());
		let request = oauth2::http::Request::builder()
			.method(oauth2::http::Method::POST)
			.uri(server.url("/token"))
			.body(Vec::new())
			.expect("Request fixture should build.");
		let response = handle.call(request).await.expect("Mock server should answer.");

		mock.assert_async().await;

		assert_eq!(response.status().as_u16(), 418);
		assert_eq!(response.body().as_slice(), b"teapot");
		assert_eq!(slot.take().and_then(|meta| meta.status), Some(418));
		assert!(slot.take().is_none(), "Metadata is consumed on read.");
	}

	#[test]
	fn default_client_builds() {
		assert!(BrokerHttpClient::new().is_ok());
	}
}

//! A small OAuth 2.0 calendar broker: run the authorization-code dance against a single
//! provider, mint signed session tokens that carry the resulting credential bundle, and create
//! calendar events on the bearer's behalf.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod api;
pub mod auth;
pub mod calendar;
pub mod config;
pub mod error;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod provider;
pub mod session;
pub mod token;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{CredentialBundle, ProviderId, ScopeSet},
		flows::{AuthorizationCoordinator, PendingAuthorization},
		http::BrokerHttpClient,
		provider::{ClientAuthMethod, DefaultProviderStrategy, ProviderDescriptor},
		token::{SessionTokenCodec, SigningSecret},
	};

	/// Secret shared by codec fixtures so tokens minted in one helper verify in another.
	pub const TEST_SIGNING_SECRET: &str = "test-signing-secret-with-at-least-32-bytes";

	/// Builds a reqwest transport that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_http_client() -> BrokerHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		BrokerHttpClient::with_client(client)
	}

	/// Builds a descriptor whose endpoints live under `base` (usually an `httpmock` server).
	pub fn test_descriptor(base: &str) -> ProviderDescriptor {
		let base = base.trim_end_matches('/');

		ProviderDescriptor::builder(
			ProviderId::new("mock-provider").expect("Provider fixture should be valid."),
		)
		.authorization_endpoint(
			Url::parse(&format!("{base}/authorize"))
				.expect("Mock authorization endpoint should parse successfully."),
		)
		.token_endpoint(
			Url::parse(&format!("{base}/token"))
				.expect("Mock token endpoint should parse successfully."),
		)
		.preferred_client_auth_method(ClientAuthMethod::ClientSecretPost)
		.build()
		.expect("Mock provider descriptor should build successfully.")
	}

	/// Constructs a coordinator wired to the insecure test transport.
	pub fn build_test_coordinator(
		descriptor: ProviderDescriptor,
		client_id: &str,
		client_secret: &str,
	) -> AuthorizationCoordinator {
		let redirect_uri = Url::parse("http://localhost:8000/oauthcallback")
			.expect("Redirect URI fixture should parse successfully.");
		let scope = ScopeSet::new(["https://www.googleapis.com/auth/calendar.events"])
			.expect("Scope fixture should be valid.");

		AuthorizationCoordinator::new(
			descriptor,
			Arc::new(DefaultProviderStrategy),
			client_id,
			client_secret,
			redirect_uri,
			scope,
			test_http_client(),
		)
	}

	/// Pending authorization for `state` created just now, with a fixed PKCE verifier.
	pub fn test_pending(state: &str) -> PendingAuthorization {
		PendingAuthorization::new(
			state,
			"verifier-fixture",
			Url::parse("http://localhost:8000/oauthcallback")
				.expect("Redirect URI fixture should parse successfully."),
			ScopeSet::new(["https://www.googleapis.com/auth/calendar.events"])
				.expect("Scope fixture should be valid."),
			OffsetDateTime::now_utc(),
		)
	}

	/// Codec keyed with [`TEST_SIGNING_SECRET`] and the default one hour lifetime.
	pub fn test_codec() -> SessionTokenCodec {
		SessionTokenCodec::new(
			SigningSecret::new(TEST_SIGNING_SECRET).expect("Test signing secret should be valid."),
		)
	}

	/// Credential bundle fixture carrying every optional field.
	pub fn test_bundle() -> CredentialBundle {
		CredentialBundle::builder()
			.access_token("ya29.access-fixture")
			.refresh_token("1//refresh-fixture")
			.token_endpoint(
				Url::parse("https://oauth2.googleapis.com/token")
					.expect("Token endpoint fixture should parse successfully."),
			)
			.client_id("client-fixture.apps.googleusercontent.com")
			.client_secret("client-secret-fixture")
			.scopes(
				ScopeSet::new(["https://www.googleapis.com/auth/calendar.events"])
					.expect("Scope fixture should be valid."),
			)
			.build()
			.expect("Credential bundle fixture should build successfully.")
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::Hash,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
use color_eyre as _;
#[cfg(test)] use {httpmock as _, tower as _};

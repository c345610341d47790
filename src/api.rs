//! HTTP surface: shared state, router, and server loop.
//!
//! | Route | Handler |
//! | --- | --- |
//! | `GET /authorize` | issue the consent redirect and remember the pending authorization |
//! | `GET`/`POST /oauthcallback` | verify state, redeem the code, return a session token |
//! | `POST /exchange` | same as the callback with a JSON `{code, state}` body |
//! | `GET /calendar` | create an event with the bearer's credential bundle |
//! | `GET /healthz` | liveness |

pub mod error;
pub mod handlers;

pub use error::ApiError;

// std
use std::net::SocketAddr;
// crates.io
use axum::{
	Router,
	http::{HeaderValue, Method, header},
	routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
// self
use crate::{
	_prelude::*, calendar::CalendarApi, flows::AuthorizationCoordinator, session::SessionStore,
	token::SessionTokenCodec,
};

/// Name of the cookie carrying the browser session id.
pub const SESSION_COOKIE: &str = "calendar_broker_session";

/// Source of the current instant used for minting and verifying session tokens.
pub type Clock = Arc<dyn Fn() -> OffsetDateTime + Send + Sync>;

/// Dependencies shared by every handler.
pub struct AppState {
	/// Authorization Code + PKCE coordinator.
	pub coordinator: AuthorizationCoordinator,
	/// Session token codec.
	pub codec: SessionTokenCodec,
	/// Pending authorizations keyed by session cookie.
	pub sessions: Arc<dyn SessionStore>,
	/// Calendar collaborator.
	pub calendar: Arc<dyn CalendarApi>,
	/// Whether the session cookie carries the `Secure` attribute.
	pub secure_cookie: bool,
	clock: Clock,
}
impl AppState {
	/// Assembles handler state around the system clock.
	pub fn new(
		coordinator: AuthorizationCoordinator,
		codec: SessionTokenCodec,
		sessions: Arc<dyn SessionStore>,
		calendar: Arc<dyn CalendarApi>,
	) -> Self {
		Self {
			coordinator,
			codec,
			sessions,
			calendar,
			secure_cookie: false,
			clock: Arc::new(OffsetDateTime::now_utc),
		}
	}

	/// Marks the session cookie `Secure`.
	pub fn with_secure_cookie(mut self, secure: bool) -> Self {
		self.secure_cookie = secure;

		self
	}

	/// Replaces the clock used for token timestamps.
	pub fn with_clock(mut self, clock: Clock) -> Self {
		self.clock = clock;

		self
	}

	/// Current instant according to the configured clock.
	pub fn now(&self) -> OffsetDateTime {
		(self.clock)()
	}
}

/// Builds the broker router with request tracing.
pub fn router(state: Arc<AppState>) -> Router {
	Router::new()
		.route("/authorize", get(handlers::authorize))
		.route("/oauthcallback", get(handlers::callback_query).post(handlers::callback_form))
		.route("/exchange", post(handlers::exchange))
		.route("/calendar", get(handlers::create_event))
		.route("/healthz", get(|| async { "ok" }))
		.with_state(state)
		.layer(TraceLayer::new_for_http())
}

/// CORS policy admitting exactly `origins`, with credentials.
///
/// An empty list yields a layer that never emits `Access-Control-Allow-Origin`.
pub fn cors_layer(origins: &[HeaderValue]) -> CorsLayer {
	let layer = CorsLayer::new()
		.allow_methods([Method::GET, Method::POST, Method::OPTIONS])
		.allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

	if origins.is_empty() {
		layer
	} else {
		layer.allow_origin(origins.to_vec()).allow_credentials(true)
	}
}

/// Binds `addr` and serves `app` until Ctrl-C.
pub async fn serve(addr: SocketAddr, app: Router) -> std::io::Result<()> {
	let listener = TcpListener::bind(addr).await?;

	tracing::info!(addr = %listener.local_addr()?, "calendar broker listening");

	axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %e, "failed to listen for shutdown signal");
		std::future::pending::<()>().await;
	}

	tracing::info!("shutdown signal received");
}

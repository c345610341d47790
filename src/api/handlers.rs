//! Route handlers.

// crates.io
use axum::{
	Form, Json,
	extract::{RawQuery, State},
	http::{HeaderMap, StatusCode, header},
	response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
// self
use crate::{
	_prelude::*,
	api::{ApiError, AppState, SESSION_COOKIE},
	auth::{CredentialBundle, SessionId},
	calendar::EventRequest,
	flows::PendingAuthorization,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Event title used when `/calendar` gets no `summary`.
pub const DEFAULT_EVENT_SUMMARY: &str = "Test";
/// Time zone used when `/calendar` gets no `time_zone`.
pub const DEFAULT_EVENT_TIME_ZONE: &str = "America/New_York";

/// Session token issued after a successful exchange.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
	/// Signed session token.
	pub access_token: String,
	/// Always `bearer`.
	pub token_type: String,
	/// Token lifetime in seconds.
	pub expires_in: i64,
}

/// JSON body accepted by `POST /exchange`.
#[derive(Clone, Debug, Deserialize)]
pub struct ExchangeRequest {
	/// Authorization code returned by the provider.
	pub code: String,
	/// State value returned by the provider.
	pub state: String,
}

/// Body of a successful `GET /calendar`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCreated {
	/// Human-readable confirmation.
	pub message: String,
}

/// `GET /authorize`: store a pending authorization and redirect to the consent screen.
pub async fn authorize(
	State(state): State<Arc<AppState>>,
	jar: CookieJar,
) -> Result<Response, ApiError> {
	let session = session_id(&jar).unwrap_or_else(SessionId::generate);
	let request = state.coordinator.begin_authorization();
	let purged =
		state.sessions.purge_expired(state.now(), state.coordinator.pending_ttl()).await?;

	if purged > 0 {
		tracing::debug!(purged, "dropped expired pending authorizations");
	}

	state.sessions.set(session.clone(), request.pending).await?;

	Ok((
		StatusCode::FOUND,
		jar.add(session_cookie(session, state.secure_cookie)),
		[(header::LOCATION, request.authorize_url.to_string())],
	)
		.into_response())
}

/// `GET /oauthcallback`: the provider redirect with `code` and `state` in the query.
pub async fn callback_query(
	State(state): State<Arc<AppState>>,
	jar: CookieJar,
	RawQuery(query): RawQuery,
) -> Result<Json<TokenResponse>, ApiError> {
	let mut callback_url = state.coordinator.redirect_uri().clone();

	callback_url.set_query(query.as_deref());

	finish_callback(&state, &jar, callback_url).await
}

/// `POST /oauthcallback`: the `form_post` variant of the provider redirect.
///
/// Browsers attach the session cookie to this cross-site POST only when it was issued with
/// `SameSite=None`, which [`session_cookie`] does for secure cookies.
pub async fn callback_form(
	State(state): State<Arc<AppState>>,
	jar: CookieJar,
	Form(fields): Form<Vec<(String, String)>>,
) -> Result<Json<TokenResponse>, ApiError> {
	let mut callback_url = state.coordinator.redirect_uri().clone();

	callback_url.query_pairs_mut().clear().extend_pairs(fields);

	finish_callback(&state, &jar, callback_url).await
}

/// `POST /exchange`: redeem a code the client captured itself.
pub async fn exchange(
	State(state): State<Arc<AppState>>,
	jar: CookieJar,
	Json(body): Json<ExchangeRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
	let pending = take_pending(&state, &jar).await?;
	let bundle =
		state.coordinator.complete_with_code(&body.state, pending.as_ref(), &body.code).await?;

	issue_token(&state, &bundle).map(Json)
}

/// `GET /calendar`: create an event with the bearer's credential bundle.
pub async fn create_event(
	State(state): State<Arc<AppState>>,
	headers: HeaderMap,
	RawQuery(query): RawQuery,
) -> Result<Json<EventCreated>, ApiError> {
	const KIND: FlowKind = FlowKind::Calendar;

	let token = bearer_token(&headers).ok_or(ApiError::MissingBearer)?;
	let now = state.now();
	let bundle = state.codec.decode(token, now)?;
	let event = event_from_query(query.as_deref(), now);
	let span = FlowSpan::new(KIND, "insert_event");

	obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

	match span.instrument(state.calendar.insert_event(&bundle, &event)).await {
		Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
		Err(e) => {
			obs::record_flow_outcome(KIND, FlowOutcome::Failure);

			return Err(e.into());
		},
	}

	Ok(Json(EventCreated { message: "Event created successfully".into() }))
}

async fn finish_callback(
	state: &AppState,
	jar: &CookieJar,
	callback_url: Url,
) -> Result<Json<TokenResponse>, ApiError> {
	let received_state = callback_url
		.query_pairs()
		.find(|(key, _)| key == "state")
		.map(|(_, value)| value.into_owned())
		.unwrap_or_default();
	let pending = take_pending(state, jar).await?;
	let bundle = state
		.coordinator
		.complete_authorization(&received_state, pending.as_ref(), &callback_url)
		.await?;

	issue_token(state, &bundle).map(Json)
}

// Removing up front makes every state value single-use, including on failure.
async fn take_pending(
	state: &AppState,
	jar: &CookieJar,
) -> Result<Option<PendingAuthorization>, ApiError> {
	match session_id(jar) {
		Some(session) => Ok(state.sessions.remove(&session).await?),
		None => Ok(None),
	}
}

fn issue_token(state: &AppState, bundle: &CredentialBundle) -> Result<TokenResponse, ApiError> {
	let access_token = state.codec.encode(bundle, state.now())?;

	Ok(TokenResponse {
		access_token,
		token_type: "bearer".into(),
		expires_in: state.codec.ttl().whole_seconds(),
	})
}

/// Session cookie for `session`.
///
/// Secure cookies use `SameSite=None` so a provider's `form_post` callback still carries them;
/// browsers reject `SameSite=None` without `Secure`, so plain-HTTP deployments fall back to `Lax`
/// and only support the redirect (GET) callback.
pub fn session_cookie(session: SessionId, secure: bool) -> Cookie<'static> {
	let same_site = if secure { SameSite::None } else { SameSite::Lax };

	Cookie::build((SESSION_COOKIE, String::from(session)))
		.path("/")
		.http_only(true)
		.same_site(same_site)
		.secure(secure)
		.build()
}

fn session_id(jar: &CookieJar) -> Option<SessionId> {
	jar.get(SESSION_COOKIE).and_then(|cookie| SessionId::new(cookie.value()).ok())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
	let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
	let (scheme, token) = value.split_once(' ')?;
	let token = token.trim();

	(scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn event_from_query(query: Option<&str>, now: OffsetDateTime) -> EventRequest {
	let mut summary = None;
	let mut time_zone = None;
	let mut attendees = Vec::new();

	for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
		match key.as_ref() {
			"summary" if !value.is_empty() => summary = Some(value.into_owned()),
			"time_zone" if !value.is_empty() => time_zone = Some(value.into_owned()),
			"attendee" if !value.is_empty() => attendees.push(value.into_owned()),
			_ => {},
		}
	}

	EventRequest::starting_tomorrow(
		now,
		summary.unwrap_or_else(|| DEFAULT_EVENT_SUMMARY.into()),
		time_zone.unwrap_or_else(|| DEFAULT_EVENT_TIME_ZONE.into()),
	)
	.with_attendees(attendees)
}

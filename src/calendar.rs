//! Calendar collaborator: create events with a bearer's credential bundle.
//!
//! [`CalendarApi`] is the seam the HTTP layer calls; [`GoogleCalendarClient`] implements it
//! against the Google Calendar v3 `events.insert` endpoint.

// std
use std::time::Duration as StdDuration;
// crates.io
use reqwest::StatusCode;
// self
use crate::{_prelude::*, auth::CredentialBundle, error::ConfigError, http::BrokerHttpClient};

/// Default Google Calendar v3 API root.
pub const DEFAULT_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

const REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(30);
const ERROR_PREVIEW_LIMIT: usize = 256;

/// Boxed future returned by [`CalendarApi`] methods.
pub type CalendarFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, CalendarError>> + 'a + Send>>;

/// Failures raised while creating calendar events.
#[derive(Debug, ThisError)]
pub enum CalendarError {
	/// The calendar API could not be reached or the request could not be built.
	#[error("Calendar API request failed.")]
	Transport {
		/// Underlying transport failure.
		#[source]
		source: ReqwestError,
	},
	/// The calendar API answered with a non-success status.
	#[error("Calendar API returned {status}: {message}.")]
	Upstream {
		/// HTTP status code.
		status: u16,
		/// Provider message, or a preview of the response body.
		message: String,
	},
	/// The success response could not be decoded.
	#[error("Calendar API returned an unexpected payload.")]
	Decode {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl From<ReqwestError> for CalendarError {
	fn from(source: ReqwestError) -> Self {
		Self::Transport { source }
	}
}

/// Event to insert on the bearer's calendar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventRequest {
	/// Event title.
	pub summary: String,
	/// Start instant.
	pub start: OffsetDateTime,
	/// End instant.
	pub end: OffsetDateTime,
	/// IANA time zone name attached to both start and end.
	pub time_zone: String,
	/// Attendee email addresses, supplied by the caller.
	pub attendees: Vec<String>,
}
impl EventRequest {
	/// Length of events built by [`EventRequest::starting_tomorrow`].
	pub const DEFAULT_DURATION: Duration = Duration::hours(2);

	/// A two hour event starting exactly one day after `now`, with no attendees.
	pub fn starting_tomorrow(
		now: OffsetDateTime,
		summary: impl Into<String>,
		time_zone: impl Into<String>,
	) -> Self {
		let start = now + Duration::days(1);

		Self {
			summary: summary.into(),
			start,
			end: start + Self::DEFAULT_DURATION,
			time_zone: time_zone.into(),
			attendees: Vec::new(),
		}
	}

	/// Replaces the attendee list.
	pub fn with_attendees<I, S>(mut self, attendees: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.attendees = attendees.into_iter().map(Into::into).collect();

		self
	}
}

/// Identifiers of an event the calendar API accepted.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedEvent {
	/// Event identifier.
	pub id: String,
	/// Link to the event in the calendar web UI.
	#[serde(default)]
	pub html_link: Option<String>,
	/// Event status (`confirmed`, `tentative`).
	#[serde(default)]
	pub status: Option<String>,
}

/// Calendar operations the broker performs on a bearer's behalf.
pub trait CalendarApi
where
	Self: Send + Sync,
{
	/// Inserts `event` into the calendar owned by the bundle's user.
	fn insert_event<'a>(
		&'a self,
		bundle: &'a CredentialBundle,
		event: &'a EventRequest,
	) -> CalendarFuture<'a, CreatedEvent>;
}

/// Google Calendar v3 client.
#[derive(Clone, Debug)]
pub struct GoogleCalendarClient {
	http_client: BrokerHttpClient,
	events_url: Url,
}
impl GoogleCalendarClient {
	/// Creates a client posting to `{api_base}/calendars/{calendar_id}/events`.
	pub fn new(
		http_client: BrokerHttpClient,
		api_base: &Url,
		calendar_id: &str,
	) -> Result<Self, ConfigError> {
		let mut events_url = api_base.clone();

		events_url
			.path_segments_mut()
			.map_err(|_| ConfigError::InvalidUrl {
				field: "calendar_api_base",
				source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
			})?
			.pop_if_empty()
			.extend(["calendars", calendar_id, "events"]);

		Ok(Self { http_client, events_url })
	}

	/// Endpoint receiving insert requests.
	pub fn events_url(&self) -> &Url {
		&self.events_url
	}
}
impl CalendarApi for GoogleCalendarClient {
	fn insert_event<'a>(
		&'a self,
		bundle: &'a CredentialBundle,
		event: &'a EventRequest,
	) -> CalendarFuture<'a, CreatedEvent> {
		Box::pin(async move {
			let body = EventBody::from(event);
			let response = self
				.http_client
				.post(self.events_url.clone())
				.bearer_auth(bundle.access_token.expose())
				.timeout(REQUEST_TIMEOUT)
				.json(&body)
				.send()
				.await?;
			let status = response.status();
			let bytes = response.bytes().await?;

			if !status.is_success() {
				return Err(upstream_error(status, &bytes));
			}

			let de = &mut serde_json::Deserializer::from_slice(&bytes);
			let created: CreatedEvent = serde_path_to_error::deserialize(de)
				.map_err(|source| CalendarError::Decode { source })?;

			tracing::info!(event_id = %created.id, "calendar event created");

			Ok(created)
		})
	}
}

#[derive(Serialize)]
struct EventBody<'a> {
	summary: &'a str,
	start: EventTime<'a>,
	end: EventTime<'a>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	attendees: Vec<Attendee<'a>>,
}
impl<'a> From<&'a EventRequest> for EventBody<'a> {
	fn from(event: &'a EventRequest) -> Self {
		Self {
			summary: &event.summary,
			start: EventTime { date_time: event.start, time_zone: &event.time_zone },
			end: EventTime { date_time: event.end, time_zone: &event.time_zone },
			attendees: event.attendees.iter().map(|email| Attendee { email }).collect(),
		}
	}
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventTime<'a> {
	#[serde(with = "time::serde::rfc3339")]
	date_time: OffsetDateTime,
	time_zone: &'a str,
}

#[derive(Serialize)]
struct Attendee<'a> {
	email: &'a str,
}

#[derive(Deserialize)]
struct GoogleErrorEnvelope {
	error: GoogleErrorBody,
}

#[derive(Deserialize)]
struct GoogleErrorBody {
	message: String,
}

fn upstream_error(status: StatusCode, body: &[u8]) -> CalendarError {
	let message = match serde_json::from_slice::<GoogleErrorEnvelope>(body) {
		Ok(envelope) => envelope.error.message,
		Err(_) => String::from_utf8_lossy(body).chars().take(ERROR_PREVIEW_LIMIT).collect(),
	};

	CalendarError::Upstream { status: status.as_u16(), message }
}

#[cfg(test)]
mod tests {
	// crates.io
	use httpmock::prelude::*;
	use time::macros;
	// self
	use super::*;
	use crate::_preludet::{test_bundle, test_http_client};

	fn client(server: &MockServer) -> GoogleCalendarClient {
		let base = Url::parse(&server.url("/calendar/v3")).expect("Mock base should parse.");

		GoogleCalendarClient::new(test_http_client(), &base, "primary")
			.expect("Calendar client should build.")
	}

	#[test]
	fn default_event_starts_tomorrow_and_lasts_two_hours() {
		let now = macros::datetime!(2025-03-09 06:30 UTC);
		let event = EventRequest::starting_tomorrow(now, "Test", "America/New_York");

		assert_eq!(event.start, macros::datetime!(2025-03-10 06:30 UTC));
		assert_eq!(event.end - event.start, Duration::hours(2));
		assert!(event.attendees.is_empty());

		let body = serde_json::to_value(EventBody::from(&event)).expect("Body should serialize.");

		assert_eq!(body["start"]["dateTime"], "2025-03-10T06:30:00Z");
		assert_eq!(body["end"]["timeZone"], "America/New_York");
		assert!(body.get("attendees").is_none());
	}

	#[test]
	fn events_url_encodes_calendar_ids() {
		let base = Url::parse(DEFAULT_CALENDAR_API_BASE).expect("Default base should parse.");
		let client = GoogleCalendarClient::new(test_http_client(), &base, "team@group.calendar")
			.expect("Calendar client should build.");

		assert_eq!(
			client.events_url().as_str(),
			"https://www.googleapis.com/calendar/v3/calendars/team@group.calendar/events"
		);

		let odd = GoogleCalendarClient::new(test_http_client(), &base, "a/b")
			.expect("Calendar client should build.");

		assert!(odd.events_url().as_str().ends_with("/calendars/a%2Fb/events"));
	}

	#[tokio::test]
	async fn insert_event_posts_bearer_and_attendees() {
		let server = MockServer::start_async().await;
		let mock = server
			.mock_async(|when, then| {
				when.method(POST)
					.path("/calendar/v3/calendars/primary/events")
					.header("authorization", "Bearer ya29.access-fixture")
					.body_includes("\"summary\":\"Planning\"")
					.body_includes("\"email\":\"guest@example.com\"");
				then.status(200)
					.header("content-type", "application/json")
					.body("{\"id\":\"evt-1\",\"status\":\"confirmed\",\"htmlLink\":\"https://calendar/evt-1\"}");
			})
			.await;
		let event = EventRequest::starting_tomorrow(OffsetDateTime::now_utc(), "Planning", "UTC")
			.with_attendees(["guest@example.com"]);
		let created = client(&server)
			.insert_event(&test_bundle(), &event)
			.await
			.expect("Insert should succeed.");

		mock.assert_async().await;

		assert_eq!(created.id, "evt-1");
		assert_eq!(created.status.as_deref(), Some("confirmed"));
	}

	#[tokio::test]
	async fn upstream_failures_keep_status_and_message() {
		let server = MockServer::start_async().await;
		let _mock = server
			.mock_async(|when, then| {
				when.method(POST).path("/calendar/v3/calendars/primary/events");
				then.status(401)
					.header("content-type", "application/json")
					.body("{\"error\":{\"code\":401,\"message\":\"Invalid Credentials\"}}");
			})
			.await;
		let event = EventRequest::starting_tomorrow(OffsetDateTime::now_utc(), "Test", "UTC");
		let err = client(&server)
			.insert_event(&test_bundle(), &event)
			.await
			.expect_err("Rejected credentials must fail.");

		match err {
			CalendarError::Upstream { status, message } => {
				assert_eq!(status, 401);
				assert_eq!(message, "Invalid Credentials");
			},
			other => panic!("Unexpected error: {other:?}."),
		}
	}

	#[tokio::test]
	async fn malformed_success_payload_is_a_decode_error() {
		let server = MockServer::start_async().await;
		let _mock = server
			.mock_async(|when, then| {
				when.method(POST).path("/calendar/v3/calendars/primary/events");
				then.status(200).header("content-type", "application/json").body("{\"kind\":1}");
			})
			.await;
		let event = EventRequest::starting_tomorrow(OffsetDateTime::now_utc(), "Test", "UTC");
		let err = client(&server)
			.insert_event(&test_bundle(), &event)
			.await
			.expect_err("Payload without id must fail.");

		assert!(matches!(err, CalendarError::Decode { .. }));
	}
}

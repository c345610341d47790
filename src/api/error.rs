//! JSON error envelope (`{"detail": ...}`) and status mapping for broker failures.

// crates.io
use axum::{
	Json,
	http::{HeaderValue, StatusCode, header},
	response::{IntoResponse, Response},
};
// self
use crate::_prelude::*;

/// Failure returned by HTTP handlers.
#[derive(Debug, ThisError)]
pub enum ApiError {
	/// `/calendar` was called without a bearer token.
	#[error("Bearer token is missing.")]
	MissingBearer,
	/// Any broker failure.
	#[error(transparent)]
	Broker(Error),
}
impl ApiError {
	/// Status code this failure maps to.
	pub fn status(&self) -> StatusCode {
		match self {
			Self::MissingBearer | Self::Broker(Error::Token(_)) => StatusCode::UNAUTHORIZED,
			Self::Broker(
				Error::InvalidState
				| Error::InvalidGrant { .. }
				| Error::InvalidClient { .. }
				| Error::InsufficientScope { .. },
			) => StatusCode::BAD_REQUEST,
			Self::Broker(Error::Transient(_) | Error::Transport(_) | Error::Calendar(_)) =>
				StatusCode::BAD_GATEWAY,
			Self::Broker(Error::Storage(_) | Error::Config(_)) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	fn detail(&self) -> String {
		match self {
			Self::MissingBearer | Self::Broker(Error::Token(_)) => "Invalid token".into(),
			Self::Broker(Error::InvalidState) => "Invalid state parameter".into(),
			Self::Broker(
				Error::InvalidGrant { reason }
				| Error::InvalidClient { reason }
				| Error::InsufficientScope { reason },
			) => reason.clone(),
			Self::Broker(Error::Transient(_) | Error::Transport(_)) =>
				"Token exchange with the identity provider failed".into(),
			Self::Broker(Error::Calendar(_)) => "Calendar request failed".into(),
			Self::Broker(Error::Storage(_) | Error::Config(_)) => "Internal server error".into(),
		}
	}
}
impl<E> From<E> for ApiError
where
	E: Into<Error>,
{
	fn from(e: E) -> Self {
		Self::Broker(e.into())
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = self.status();

		match &self {
			Self::MissingBearer => tracing::debug!("request without bearer token"),
			Self::Broker(Error::Token(kind)) => tracing::debug!(?kind, "session token rejected"),
			_ if status.is_server_error() => tracing::error!(error = %self, "request failed"),
			_ => tracing::info!(error = %self, "request rejected"),
		}

		let mut response = (status, Json(ErrorBody { detail: self.detail() })).into_response();

		if status == StatusCode::UNAUTHORIZED {
			response
				.headers_mut()
				.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
		}

		response
	}
}

#[derive(Serialize)]
struct ErrorBody {
	detail: String,
}

//! Server-side session storage for pending authorizations.
//!
//! A browser session is identified by the [`SessionId`] carried in the session cookie. Between
//! `/authorize` and the callback the store holds the session's [`PendingAuthorization`] (state
//! value, PKCE verifier, redirect URI). Nothing else is kept server-side, and records past the
//! pending lifetime are purged whenever a new one is stored.

pub mod file;
pub mod memory;

pub use file::FileSessionStore;
pub use memory::MemorySessionStore;

// self
use crate::{_prelude::*, auth::SessionId, flows::PendingAuthorization};

/// Boxed future returned by [`SessionStore`] methods.
pub type SessionFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, SessionStoreError>> + 'a + Send>>;

/// Storage backend contract for pending authorizations keyed by session id.
pub trait SessionStore
where
	Self: Send + Sync,
{
	/// Returns the pending authorization for `session`, if any.
	fn get<'a>(
		&'a self,
		session: &'a SessionId,
	) -> SessionFuture<'a, Option<PendingAuthorization>>;

	/// Stores or replaces the pending authorization for `session`.
	fn set(&self, session: SessionId, pending: PendingAuthorization) -> SessionFuture<'_, ()>;

	/// Removes and returns the pending authorization for `session`.
	fn remove<'a>(
		&'a self,
		session: &'a SessionId,
	) -> SessionFuture<'a, Option<PendingAuthorization>>;

	/// Drops every pending authorization older than `ttl` at `now`; returns how many went.
	fn purge_expired(&self, now: OffsetDateTime, ttl: Duration) -> SessionFuture<'_, usize>;
}

/// Error type produced by [`SessionStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum SessionStoreError {
	/// Snapshot could not be encoded or decoded.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

//! In-memory [`SessionStore`] backed by a shared `HashMap`.

// self
use crate::{
	_prelude::*,
	auth::SessionId,
	flows::PendingAuthorization,
	session::{SessionFuture, SessionStore},
};

/// Thread-safe in-memory session store; contents vanish with the process.
#[derive(Clone, Debug, Default)]
pub struct MemorySessionStore {
	inner: Arc<RwLock<HashMap<SessionId, PendingAuthorization>>>,
}
impl MemorySessionStore {
	/// Number of sessions with a pending authorization.
	pub fn len(&self) -> usize {
		self.inner.read().len()
	}

	/// Returns `true` when no authorization is pending.
	pub fn is_empty(&self) -> bool {
		self.inner.read().is_empty()
	}
}
impl SessionStore for MemorySessionStore {
	fn get<'a>(
		&'a self,
		session: &'a SessionId,
	) -> SessionFuture<'a, Option<PendingAuthorization>> {
		Box::pin(async move { Ok(self.inner.read().get(session).cloned()) })
	}

	fn set(&self, session: SessionId, pending: PendingAuthorization) -> SessionFuture<'_, ()> {
		Box::pin(async move {
			self.inner.write().insert(session, pending);

			Ok(())
		})
	}

	fn remove<'a>(
		&'a self,
		session: &'a SessionId,
	) -> SessionFuture<'a, Option<PendingAuthorization>> {
		Box::pin(async move { Ok(self.inner.write().remove(session)) })
	}

	fn purge_expired(&self, now: OffsetDateTime, ttl: Duration) -> SessionFuture<'_, usize> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let before = guard.len();

			guard.retain(|_, pending| !pending.is_expired(now, ttl));

			Ok(before - guard.len())
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::test_pending;

	#[tokio::test]
	async fn set_get_remove_round_trip() {
		let store = MemorySessionStore::default();
		let session = SessionId::generate();
		let pending = test_pending("state-1");

		assert!(store.get(&session).await.expect("Get should succeed.").is_none());

		store.set(session.clone(), pending.clone()).await.expect("Set should succeed.");

		assert_eq!(store.len(), 1);
		assert_eq!(store.get(&session).await.expect("Get should succeed."), Some(pending.clone()));
		assert_eq!(store.remove(&session).await.expect("Remove should succeed."), Some(pending));
		assert!(store.remove(&session).await.expect("Remove should succeed.").is_none());
		assert!(store.is_empty());
	}

	#[tokio::test]
	async fn set_replaces_previous_authorization() {
		let store = MemorySessionStore::default();
		let session = SessionId::generate();

		store.set(session.clone(), test_pending("first")).await.expect("Set should succeed.");
		store.set(session.clone(), test_pending("second")).await.expect("Set should succeed.");

		let current = store
			.get(&session)
			.await
			.expect("Get should succeed.")
			.expect("Pending authorization should exist.");

		assert_eq!(current.state, "second");
		assert_eq!(store.len(), 1);
	}

	#[tokio::test]
	async fn purge_drops_only_expired_authorizations() {
		let store = MemorySessionStore::default();
		let ttl = Duration::minutes(10);
		let now = OffsetDateTime::now_utc();

		for i in 0..50 {
			let mut pending = test_pending(&format!("stale-{i}"));

			pending.created_at = now - Duration::minutes(11);

			store.set(SessionId::generate(), pending).await.expect("Set should succeed.");
		}

		let fresh = SessionId::generate();

		store.set(fresh.clone(), test_pending("fresh")).await.expect("Set should succeed.");

		assert_eq!(store.len(), 51);
		assert_eq!(store.purge_expired(now, ttl).await.expect("Purge should succeed."), 50);
		assert_eq!(store.len(), 1);
		assert!(store.get(&fresh).await.expect("Get should succeed.").is_some());
		assert_eq!(store.purge_expired(now, ttl).await.expect("Purge should succeed."), 0);
	}
}

//! File-backed [`SessionStore`] so pending authorizations survive a restart.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// crates.io
use tokio::{sync::Mutex as AsyncMutex, task};
// self
use crate::{
	_prelude::*,
	auth::SessionId,
	flows::PendingAuthorization,
	session::{SessionFuture, SessionStore, SessionStoreError},
};

type Snapshot = HashMap<SessionId, PendingAuthorization>;

/// Persists pending authorizations to a JSON file after each mutation.
///
/// Mutations are serialized through an async gate so snapshots reach the disk in the order they
/// were taken; file IO runs on the blocking pool.
#[derive(Clone, Debug)]
pub struct FileSessionStore {
	path: PathBuf,
	inner: Arc<RwLock<Snapshot>>,
	persist_gate: Arc<AsyncMutex<()>>,
}
impl FileSessionStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, SessionStoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self {
			path,
			inner: Arc::new(RwLock::new(snapshot)),
			persist_gate: Arc::new(AsyncMutex::new(())),
		})
	}

	/// Location of the JSON snapshot.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Number of sessions with a pending authorization.
	pub fn len(&self) -> usize {
		self.inner.read().len()
	}

	/// Returns `true` when no authorization is pending.
	pub fn is_empty(&self) -> bool {
		self.inner.read().is_empty()
	}

	fn load_snapshot(path: &Path) -> Result<Snapshot, SessionStoreError> {
		if !path.exists() {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| SessionStoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(HashMap::new());
		}

		let entries: Vec<(SessionId, PendingAuthorization)> =
			serde_json::from_slice(&bytes).map_err(|e| SessionStoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(entries.into_iter().collect())
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), SessionStoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| SessionStoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	/// Applies `mutate` to the snapshot and writes it out when `mutate` reports a change.
	async fn mutate<T, F>(&self, mutate: F) -> Result<T, SessionStoreError>
	where
		T: Send,
		F: Send + FnOnce(&mut Snapshot) -> (T, bool),
	{
		let _gate = self.persist_gate.lock().await;
		let (output, serialized) = {
			let mut guard = self.inner.write();
			let (output, changed) = mutate(&mut guard);
			let serialized = if changed { Some(serialize_snapshot(&guard)?) } else { None };

			(output, serialized)
		};

		if let Some(bytes) = serialized {
			let path = self.path.clone();

			task::spawn_blocking(move || write_atomically(&path, &bytes)).await.map_err(|e| {
				SessionStoreError::Backend {
					message: format!("Session snapshot writer did not finish: {e}"),
				}
			})??;
		}

		Ok(output)
	}
}
impl SessionStore for FileSessionStore {
	fn get<'a>(
		&'a self,
		session: &'a SessionId,
	) -> SessionFuture<'a, Option<PendingAuthorization>> {
		Box::pin(async move { Ok(self.inner.read().get(session).cloned()) })
	}

	fn set(&self, session: SessionId, pending: PendingAuthorization) -> SessionFuture<'_, ()> {
		Box::pin(self.mutate(move |snapshot| {
			snapshot.insert(session, pending);

			((), true)
		}))
	}

	fn remove<'a>(
		&'a self,
		session: &'a SessionId,
	) -> SessionFuture<'a, Option<PendingAuthorization>> {
		Box::pin(self.mutate(move |snapshot| {
			let removed = snapshot.remove(session);
			let changed = removed.is_some();

			(removed, changed)
		}))
	}

	fn purge_expired(&self, now: OffsetDateTime, ttl: Duration) -> SessionFuture<'_, usize> {
		Box::pin(self.mutate(move |snapshot| {
			let before = snapshot.len();

			snapshot.retain(|_, pending| !pending.is_expired(now, ttl));

			let purged = before - snapshot.len();

			(purged, purged > 0)
		}))
	}
}

fn serialize_snapshot(snapshot: &Snapshot) -> Result<Vec<u8>, SessionStoreError> {
	let entries: Vec<_> = snapshot.iter().collect();

	serde_json::to_vec_pretty(&entries).map_err(|e| SessionStoreError::Serialization {
		message: format!("Failed to serialize session snapshot: {e}"),
	})
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), SessionStoreError> {
	let mut tmp_path = path.to_path_buf();

	tmp_path.set_extension("tmp");

	{
		let mut file = File::create(&tmp_path).map_err(|e| SessionStoreError::Backend {
			message: format!("Failed to create {}: {e}", tmp_path.display()),
		})?;

		file.write_all(bytes).map_err(|e| SessionStoreError::Backend {
			message: format!("Failed to write {}: {e}", tmp_path.display()),
		})?;
		file.sync_all().map_err(|e| SessionStoreError::Backend {
			message: format!("Failed to sync {}: {e}", tmp_path.display()),
		})?;
	}

	fs::rename(&tmp_path, path).map_err(|e| SessionStoreError::Backend {
		message: format!("Failed to replace {}: {e}", path.display()),
	})
}

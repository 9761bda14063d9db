//! File-backed [`CacheStore`] that survives process restarts.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	clock::{SharedClock, SystemClock},
	store::{CacheEntry, CacheStore, StoreError, StoreFuture},
};

type Snapshot = HashMap<String, CacheEntry>;

/// Keeps entries in memory and rewrites a JSON snapshot after each mutation.
///
/// The snapshot is written to a sibling `.tmp` file, synced, and renamed over the
/// target so a crash never leaves a truncated file behind. Expired entries are dropped
/// when the snapshot is loaded.
#[derive(Clone, Debug)]
pub struct FileCacheStore {
	path: PathBuf,
	inner: Arc<RwLock<Snapshot>>,
	clock: SharedClock,
}
impl FileCacheStore {
	/// Opens (or creates) a store at `path` using the system clock.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		Self::open_with_clock(path, Arc::new(SystemClock))
	}

	/// Opens (or creates) a store at `path` driven by `clock`.
	pub fn open_with_clock(path: impl Into<PathBuf>, clock: SharedClock) -> Result<Self, StoreError> {
		let path = path.into();

		ensure_parent_exists(&path)?;

		let now = clock.now();
		let mut snapshot = load_snapshot(&path)?;

		snapshot.retain(|_, entry| entry.is_live_at(now));

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)), clock })
	}

	/// Location of the JSON snapshot.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn persist_locked(&self, contents: &Snapshot) -> Result<(), StoreError> {
		ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(contents).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize cache snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| backend("create", &tmp_path, e))?;

			file.write_all(&serialized).map_err(|e| backend("write", &tmp_path, e))?;
			file.sync_all().map_err(|e| backend("sync", &tmp_path, e))?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| backend("replace", &self.path, e))
	}
}
impl CacheStore for FileCacheStore {
	fn set_string<'a>(
		&'a self,
		key: &'a str,
		value: String,
		expires_at: Option<OffsetDateTime>,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let now = self.clock.now();
			let mut guard = self.inner.write();

			guard.retain(|_, entry| entry.is_live_at(now));
			guard.insert(key.to_owned(), CacheEntry { value, expires_at });

			self.persist_locked(&guard)
		})
	}

	fn get_string<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move {
			let now = self.clock.now();

			Ok(self
				.inner
				.read()
				.get(key)
				.filter(|entry| entry.is_live_at(now))
				.map(|entry| entry.value.clone()))
		})
	}

	fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			if guard.remove(key).is_some() {
				self.persist_locked(&guard)?;
			}

			Ok(())
		})
	}
}

fn load_snapshot(path: &Path) -> Result<Snapshot, StoreError> {
	if !path.exists() {
		return Ok(HashMap::new());
	}

	let bytes = fs::read(path).map_err(|e| backend("read", path, e))?;

	if bytes.is_empty() {
		return Ok(HashMap::new());
	}

	serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
		message: format!("Failed to parse {}: {e}", path.display()),
	})
}

fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).map_err(|e| backend("create directory", parent, e))?;
	}

	Ok(())
}

fn backend(action: &str, path: &Path, e: std::io::Error) -> StoreError {
	StoreError::Backend { message: format!("Failed to {action} {}: {e}", path.display()) }
}

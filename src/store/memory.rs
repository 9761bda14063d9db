//! Thread-safe in-memory [`CacheStore`] for single-process deployments and tests.

// self
use crate::{
	_prelude::*,
	clock::{SharedClock, SystemClock},
	store::{CacheEntry, CacheStore, StoreFuture},
};

type EntryMap = Arc<RwLock<HashMap<String, CacheEntry>>>;

/// Process-local store that honors absolute expiration against a [`Clock`](crate::clock::Clock).
#[derive(Clone, Debug)]
pub struct MemoryCacheStore {
	entries: EntryMap,
	clock: SharedClock,
}
impl MemoryCacheStore {
	/// Creates an empty store driven by `clock`.
	pub fn with_clock(clock: SharedClock) -> Self {
		Self { entries: Default::default(), clock }
	}

	/// Number of stored entries, including ones that expired but were not read yet.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	/// Whether the store holds no entries.
	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}

	fn get_now(entries: &EntryMap, key: &str, now: OffsetDateTime) -> Option<String> {
		{
			let guard = entries.read();

			match guard.get(key) {
				Some(entry) if entry.is_live_at(now) => return Some(entry.value.clone()),
				Some(_) => {},
				None => return None,
			}
		}

		let mut guard = entries.write();

		// Re-check under the write lock so a concurrent `set` is not discarded.
		if guard.get(key).is_some_and(|entry| !entry.is_live_at(now)) {
			guard.remove(key);
		}

		None
	}
}
impl Default for MemoryCacheStore {
	fn default() -> Self {
		Self::with_clock(Arc::new(SystemClock))
	}
}
impl CacheStore for MemoryCacheStore {
	fn set_string<'a>(
		&'a self,
		key: &'a str,
		value: String,
		expires_at: Option<OffsetDateTime>,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.entries.write().insert(key.to_owned(), CacheEntry { value, expires_at });

			Ok(())
		})
	}

	fn get_string<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move { Ok(Self::get_now(&self.entries, key, self.clock.now())) })
	}

	fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.entries.write().remove(key);

			Ok(())
		})
	}
}

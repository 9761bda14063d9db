//! Key-value storage contract behind the client token cache, plus built-in stores.

pub mod file;
pub mod memory;

pub use file::FileCacheStore;
pub use memory::MemoryCacheStore;

// self
use crate::_prelude::*;

/// Boxed future returned by [`CacheStore`] and [`ClientTokenCache`](crate::cache::ClientTokenCache)
/// operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// String key-value store with absolute expiration.
///
/// Implementations must treat an entry as absent once its expiration has passed and
/// must accept `remove` for keys that do not exist.
pub trait CacheStore
where
	Self: Send + Sync,
{
	/// Stores `value` under `key`, replacing any previous entry. `None` never expires.
	fn set_string<'a>(
		&'a self,
		key: &'a str,
		value: String,
		expires_at: Option<OffsetDateTime>,
	) -> StoreFuture<'a, ()>;

	/// Reads a live entry.
	fn get_string<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Deletes an entry.
	fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`CacheStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failure surfaced by the store or the cache layer.
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

/// Stored value plus its absolute expiration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
	/// Stored payload.
	pub value: String,
	/// Instant from which the entry is no longer visible.
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub expires_at: Option<OffsetDateTime>,
}
impl CacheEntry {
	/// Whether the entry is visible at `now`.
	pub fn is_live_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at.is_none_or(|expires_at| now < expires_at)
	}
}

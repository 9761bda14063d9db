//! Per-key request coalescing.
//!
//! [`SingleFlight`] guarantees that at most one producer future is outstanding per key.
//! Callers that arrive while a producer is running await the same shared result; their
//! own producer closures are never invoked. The entry is removed by the producer itself
//! right before it yields, so every waiter sees the map already cleared and the next
//! caller always starts a fresh acquisition. Results, including errors, are never
//! retained.
//!
//! Dropping a waiter never cancels the shared producer. Inside a Tokio runtime a detached
//! driver task polls every flight, so the producer runs to completion even after all of
//! its waiters are gone. Outside a runtime the remaining (or next) waiter drives it.

// crates.io
use futures::{
	FutureExt,
	future::{BoxFuture, Shared},
};
// self
use crate::_prelude::*;

type Flight<T> = Shared<BoxFuture<'static, T>>;
type FlightMap<T> = Arc<Mutex<HashMap<String, Flight<T>>>>;

/// Coalesces concurrent acquisitions that share a key.
pub struct SingleFlight<T>
where
	T: 'static + Clone + Send + Sync,
{
	flights: FlightMap<T>,
}
impl<T> SingleFlight<T>
where
	T: 'static + Clone + Send + Sync,
{
	/// Creates an empty coordinator.
	pub fn new() -> Self {
		Self { flights: Default::default() }
	}

	/// Runs `producer` for `key`, or joins the producer already running for it.
	///
	/// `producer` is invoked synchronously (without being polled) only when no flight
	/// exists for `key`.
	pub fn synchronize<F, Fut>(&self, key: impl Into<String>, producer: F) -> Flight<T>
	where
		F: FnOnce() -> Fut,
		Fut: 'static + Send + Future<Output = T>,
	{
		let key = key.into();
		let mut flights = self.flights.lock();

		if let Some(flight) = flights.get(&key) {
			tracing::trace!(key = %key, "Joining in-flight acquisition.");

			return flight.clone();
		}

		tracing::trace!(key = %key, "Starting acquisition.");

		let registry = Arc::downgrade(&self.flights);
		let fut = producer();
		let owned_key = key.clone();
		let flight = async move {
			let output = fut.await;

			if let Some(registry) = registry.upgrade() {
				registry.lock().remove(&owned_key);
			}

			output
		}
		.boxed()
		.shared();

		flights.insert(key, flight.clone());
		drop(flights);

		if let Ok(runtime) = tokio::runtime::Handle::try_current() {
			runtime.spawn(flight.clone());
		}

		flight
	}

	/// Number of keys with an outstanding producer.
	pub fn in_flight(&self) -> usize {
		self.flights.lock().len()
	}
}
impl<T> Clone for SingleFlight<T>
where
	T: 'static + Clone + Send + Sync,
{
	fn clone(&self) -> Self {
		Self { flights: self.flights.clone() }
	}
}
impl<T> Default for SingleFlight<T>
where
	T: 'static + Clone + Send + Sync,
{
	fn default() -> Self {
		Self::new()
	}
}
impl<T> Debug for SingleFlight<T>
where
	T: 'static + Clone + Send + Sync,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SingleFlight").field("in_flight", &self.in_flight()).finish()
	}
}

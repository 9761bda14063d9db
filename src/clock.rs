//! Injectable time sources.

// self
use crate::_prelude::*;

/// Shared handle to a [`Clock`].
pub type SharedClock = Arc<dyn Clock>;

/// Source of the current UTC instant.
pub trait Clock
where
	Self: Send + Sync + Debug,
{
	/// Returns the current instant.
	fn now(&self) -> OffsetDateTime;
}

/// Wall clock backed by [`OffsetDateTime::now_utc`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// Manually driven clock for tests and simulations.
///
/// Clones share the same instant, so advancing one handle moves every component
/// holding a clone.
#[derive(Clone, Debug)]
pub struct ManualClock(Arc<Mutex<OffsetDateTime>>);
impl ManualClock {
	/// Creates a clock frozen at `start`.
	pub fn new(start: OffsetDateTime) -> Self {
		Self(Arc::new(Mutex::new(start)))
	}

	/// Moves the clock to `instant`.
	pub fn set(&self, instant: OffsetDateTime) {
		*self.0.lock() = instant;
	}

	/// Moves the clock forward (or backward, for negative values) by `delta`.
	pub fn advance(&self, delta: Duration) {
		*self.0.lock() += delta;
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		*self.0.lock()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn manual_clock_clones_share_time() {
		let clock = ManualClock::new(macros::datetime!(2025-01-01 00:00 UTC));
		let shared: SharedClock = Arc::new(clock.clone());

		clock.advance(Duration::minutes(5));

		assert_eq!(shared.now(), macros::datetime!(2025-01-01 00:05 UTC));

		clock.set(macros::datetime!(2024-12-31 23:00 UTC));

		assert_eq!(shared.now(), macros::datetime!(2024-12-31 23:00 UTC));
	}
}

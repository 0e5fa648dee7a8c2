//! Common types used throughout the settlement engine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

// Re-export the primitive types the rest of the workspace builds on
pub use alloy_primitives::{Address, B256, U256, U512};

/// Fungible asset identifier (token contract address or equivalent).
pub type AssetId = Address;

/// Content-derived unique id of an intent.
pub type IntentHash = B256;

/// Fixed-point base-unit amount.
pub type Amount = U256;

/// Timestamp (Unix seconds)
pub type Timestamp = u64;

/// Scale factor for solution scores: `score = buy_amount * SCORE_SCALE / sell_amount`.
pub const SCORE_SCALE: u64 = 1_000_000_000_000_000_000;

/// Time source for batch windows and deadline checks.
///
/// Settlement logic never reads the system clock directly; it goes through
/// this trait so tests and simulations can drive time deterministically.
pub trait Clock: Send + Sync {
	fn now(&self) -> Timestamp;
}

/// Wall-clock implementation backed by `SystemTime`.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> Timestamp {
		SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map(|d| d.as_secs())
			.unwrap_or(0)
	}
}

/// Manually driven clock for tests and simulation.
#[derive(Debug, Default)]
pub struct ManualClock {
	now: AtomicU64,
}

impl ManualClock {
	pub fn new(now: Timestamp) -> Self {
		Self {
			now: AtomicU64::new(now),
		}
	}

	pub fn set(&self, now: Timestamp) {
		self.now.store(now, Ordering::SeqCst);
	}

	pub fn advance(&self, secs: u64) {
		self.now.fetch_add(secs, Ordering::SeqCst);
	}
}

impl Clock for ManualClock {
	fn now(&self) -> Timestamp {
		self.now.load(Ordering::SeqCst)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn manual_clock_advances() {
		let clock = ManualClock::new(100);
		assert_eq!(clock.now(), 100);
		clock.advance(30);
		assert_eq!(clock.now(), 130);
		clock.set(1_000);
		assert_eq!(clock.now(), 1_000);
	}
}

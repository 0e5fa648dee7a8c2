//! Batch scheduling types.

use serde::{Deserialize, Serialize};

use crate::common::{Amount, IntentHash, Timestamp};

/// Monotonic identifier of a batch window.
pub type BatchId = u64;

/// A fixed-duration auction window collecting intents and solutions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
	pub batch_id: BatchId,
	pub start_time: Timestamp,
	/// `start_time + batch_duration`; immutable once set.
	pub end_time: Timestamp,
	/// Intents assigned to this window, in submission order. The order fixes
	/// the CoW scan and auction iteration, keeping settlement deterministic.
	pub intent_hashes: Vec<IntentHash>,
	pub settled: bool,
}

impl Batch {
	/// Settlement is permitted once the window has elapsed.
	pub fn is_ready(&self, now: Timestamp) -> bool {
		now >= self.end_time
	}
}

/// A direct peer-to-peer pairing recorded during settlement. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CowMatch {
	pub batch_id: BatchId,
	pub intent_a: IntentHash,
	pub intent_b: IntentHash,
	/// Amount exchanged in each direction: `min` of the two sell amounts.
	pub matched_amount: Amount,
}

/// Outcome summary returned by a settlement pass.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SettlementReport {
	pub batch_id: BatchId,
	/// Intents that reached `Executed` in this pass (CoW or auction).
	pub executed_count: usize,
	/// Number of CoW pairings recorded.
	pub cow_match_count: usize,
}

/// Read-only snapshot of the current batch, for external queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchInfo {
	pub batch_id: BatchId,
	pub start_time: Timestamp,
	pub end_time: Timestamp,
	pub intent_count: usize,
	pub settled: bool,
}

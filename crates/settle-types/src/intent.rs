//! Intent types for the settlement engine.
//!
//! An intent expresses a desired trade outcome ("sell X of asset A, receive
//! at least Y of asset B by deadline D") without an execution path. Intents
//! are retained forever as immutable audit records once they reach a
//! terminal state.

use alloy_primitives::keccak256;
use serde::{Deserialize, Serialize};

use crate::common::{Address, Amount, AssetId, IntentHash, Timestamp};

/// Lifecycle state of an intent. Terminal states never transition back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentState {
	Open,
	Executed,
	Cancelled,
}

impl IntentState {
	pub fn is_final(&self) -> bool {
		!matches!(self, IntentState::Open)
	}
}

/// A user's trading request, escrowed on submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
	/// Account that submitted the intent and funded its escrow.
	pub owner: Address,
	/// Asset the owner gives up.
	pub sell_asset: AssetId,
	/// Asset the owner wants to receive.
	pub buy_asset: AssetId,
	/// Escrowed amount of `sell_asset`, in base units.
	pub sell_amount: Amount,
	/// Minimum acceptable amount of `buy_asset`.
	pub min_buy_amount: Amount,
	/// Unix timestamp after which the intent must not execute.
	pub deadline: Timestamp,
	/// Account receiving the proceeds. Defaults to `owner`.
	pub receiver: Address,
	/// Content hash identifying this intent.
	pub intent_hash: IntentHash,
	/// Current lifecycle state.
	pub state: IntentState,
	/// Timestamp when the intent was accepted.
	pub submitted_at: Timestamp,
}

impl Intent {
	pub fn is_open(&self) -> bool {
		self.state == IntentState::Open
	}

	/// Whether this intent's deadline has passed at `now`.
	pub fn is_expired(&self, now: Timestamp) -> bool {
		now >= self.deadline
	}

	/// True if `other` trades in the exact opposite direction.
	pub fn is_counterparty_of(&self, other: &Intent) -> bool {
		self.sell_asset == other.buy_asset && self.buy_asset == other.sell_asset
	}
}

/// Computes the content hash of an intent.
///
/// The submission nonce is mixed in so that two identical intents submitted
/// back to back still get distinct hashes.
pub fn compute_intent_hash(
	owner: &Address,
	sell_asset: &AssetId,
	buy_asset: &AssetId,
	sell_amount: &Amount,
	min_buy_amount: &Amount,
	deadline: Timestamp,
	receiver: &Address,
	nonce: u64,
) -> IntentHash {
	let mut buf = Vec::with_capacity(20 * 4 + 32 * 2 + 8 * 2);
	buf.extend_from_slice(owner.as_slice());
	buf.extend_from_slice(sell_asset.as_slice());
	buf.extend_from_slice(buy_asset.as_slice());
	buf.extend_from_slice(&sell_amount.to_be_bytes::<32>());
	buf.extend_from_slice(&min_buy_amount.to_be_bytes::<32>());
	buf.extend_from_slice(&deadline.to_be_bytes());
	buf.extend_from_slice(receiver.as_slice());
	buf.extend_from_slice(&nonce.to_be_bytes());
	keccak256(&buf)
}

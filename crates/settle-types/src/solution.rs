//! Solver solution types.
//!
//! A solution is a solver's proposed fulfillment of a single intent. Solutions
//! are kept in submission order; that order is the tie-break key during
//! auction selection.

use serde::{Deserialize, Serialize};

use crate::common::{Address, Amount, IntentHash, Timestamp, U256, U512, SCORE_SCALE};

/// A solver's bid to fulfill one intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
	/// Bonded solver account that submitted this solution.
	pub solver: Address,
	/// Intent this solution targets.
	pub intent_hash: IntentHash,
	/// Amount of the intent's buy asset the solver offers.
	pub buy_amount: Amount,
	/// Comparable quality score, derived at submission time.
	pub score: U256,
	/// Solver's estimate of execution cost.
	pub execution_gas_estimate: u64,
	/// Set on exactly one solution per intent after auction resolution.
	pub selected: bool,
	/// Timestamp when the solution was accepted.
	pub submitted_at: Timestamp,
}

/// Computes a solution's score.
///
/// `buy_amount * SCORE_SCALE / sell_amount`, discounted by 5% when the gas
/// estimate exceeds the penalty threshold. `sell_amount` is validated to be
/// non-zero at intent submission.
pub fn compute_score(
	buy_amount: Amount,
	sell_amount: Amount,
	execution_gas_estimate: u64,
	gas_penalty_threshold: u64,
) -> U256 {
	// Widen before scaling: `buy_amount * SCORE_SCALE` can exceed 256 bits
	// and a wrapped score would rank a better offer below a worse one.
	let scaled = U512::from(buy_amount) * U512::from(SCORE_SCALE) / U512::from(sell_amount);
	let mut score = scaled.saturating_to::<U256>();
	if execution_gas_estimate > gas_penalty_threshold {
		score = score * U256::from(95) / U256::from(100);
	}
	score
}

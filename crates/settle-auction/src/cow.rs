//! Coincidence-of-Wants matching.
//!
//! Scans a batch's open intents for pairs trading in exactly opposite
//! directions and pairs them at a single common amount, without solver
//! involvement. Planning is a pure function of the batch's fixed intent
//! ordering; the engine executes the resulting transfers.

use tracing::debug;

use settle_types::{Amount, Intent, IntentHash};

/// A pairing the matcher decided on. Each intent appears in at most one
/// planned match per settlement pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMatch {
	pub intent_a: IntentHash,
	pub intent_b: IntentHash,
	/// Amount exchanged in each direction: `min` of the two sell amounts.
	pub matched_amount: Amount,
}

/// Plans direct matches over the batch's still-open intents.
///
/// Pairs are scanned in ascending `(i, j)` order over the given slice; the
/// first valid match consumes both intents, so the result is deterministic
/// for a fixed intent ordering. A pair matches only in the exact opposite
/// direction, and only if `min(sell_a, sell_b)` covers both minimum buy
/// amounts; intents are consumed whole, never partially.
pub fn plan_matches(intents: &[Intent]) -> Vec<PlannedMatch> {
	let mut consumed = vec![false; intents.len()];
	let mut matches = Vec::new();

	for i in 0..intents.len() {
		if consumed[i] {
			continue;
		}
		for j in (i + 1)..intents.len() {
			if consumed[j] {
				continue;
			}
			let (a, b) = (&intents[i], &intents[j]);
			if !a.is_counterparty_of(b) {
				continue;
			}
			let matched_amount = a.sell_amount.min(b.sell_amount);
			// What `a` gives must satisfy `b`, and vice versa.
			if matched_amount < b.min_buy_amount || matched_amount < a.min_buy_amount {
				continue;
			}
			debug!(
				intent_a = %a.intent_hash,
				intent_b = %b.intent_hash,
				amount = %matched_amount,
				"cow match planned"
			);
			matches.push(PlannedMatch {
				intent_a: a.intent_hash,
				intent_b: b.intent_hash,
				matched_amount,
			});
			consumed[i] = true;
			consumed[j] = true;
			break;
		}
	}

	matches
}

//! Bonded solver account types.

use serde::{Deserialize, Serialize};

use crate::common::{Address, Amount, U256};

/// A registered third-party solver.
///
/// The bond is escrowed stake posted at registration; it gates solution
/// acceptance and is never partially withdrawn here (unbonding is handled
/// outside the engine).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverRecord {
	pub solver: Address,
	pub bond: Amount,
	/// Running total of scores from executed solutions.
	pub cumulative_score: U256,
}

impl SolverRecord {
	pub fn new(solver: Address, bond: Amount) -> Self {
		Self {
			solver,
			bond,
			cumulative_score: U256::ZERO,
		}
	}
}

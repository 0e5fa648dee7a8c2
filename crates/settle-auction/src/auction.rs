//! Competitive solution auction.
//!
//! Solvers submit competing fulfillments per intent during an open batch
//! window; selection picks the strictly highest score with an
//! earliest-submission tie-break, so resubmission cannot manipulate the
//! outcome.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use crate::AuctionError;
use settle_registry::{IntentRegistry, SolverRegistry};
use settle_types::{compute_score, Address, Amount, Clock, IntentHash, Solution};

/// Collects solver solutions per intent and selects winners.
pub struct SolutionAuction {
	/// Solutions per intent, in submission order. The index is the
	/// tie-break key.
	solutions: DashMap<IntentHash, Vec<Solution>>,
	intents: Arc<IntentRegistry>,
	solvers: Arc<SolverRegistry>,
	clock: Arc<dyn Clock>,
	gas_penalty_threshold: u64,
}

impl SolutionAuction {
	pub fn new(
		intents: Arc<IntentRegistry>,
		solvers: Arc<SolverRegistry>,
		clock: Arc<dyn Clock>,
		gas_penalty_threshold: u64,
	) -> Self {
		Self {
			solutions: DashMap::new(),
			intents,
			solvers,
			clock,
			gas_penalty_threshold,
		}
	}

	/// Accepts a solver's solution for an open, unexpired intent.
	pub fn submit(
		&self,
		solver: Address,
		intent_hash: IntentHash,
		buy_amount: Amount,
		execution_gas_estimate: u64,
	) -> Result<Solution, AuctionError> {
		if !self.solvers.slash_eligible(&solver) {
			return Err(AuctionError::NotApprovedSolver);
		}

		let intent = self
			.intents
			.get(&intent_hash)
			.ok_or(AuctionError::UnknownIntent)?;
		if intent.state.is_final() {
			return Err(AuctionError::IntentFinal);
		}
		let now = self.clock.now();
		if intent.is_expired(now) {
			return Err(AuctionError::Expired);
		}
		if buy_amount < intent.min_buy_amount {
			return Err(AuctionError::BelowMinimum);
		}

		let score = compute_score(
			buy_amount,
			intent.sell_amount,
			execution_gas_estimate,
			self.gas_penalty_threshold,
		);
		let solution = Solution {
			solver,
			intent_hash,
			buy_amount,
			score,
			execution_gas_estimate,
			selected: false,
			submitted_at: now,
		};

		self.solutions
			.entry(intent_hash)
			.or_default()
			.push(solution.clone());

		info!(%intent_hash, %solver, buy_amount = %buy_amount, score = %score, "solution submitted");
		Ok(solution)
	}

	/// Selects the winning solution for an intent, if any.
	///
	/// Strictly highest score wins; ties go to the earliest submission, so
	/// repeated calls over the same book always return the same winner.
	/// The winner is flagged `selected` in the book.
	pub fn select_best(&self, intent_hash: &IntentHash) -> Option<Solution> {
		let mut entry = self.solutions.get_mut(intent_hash)?;

		let mut best: Option<usize> = None;
		for (idx, solution) in entry.iter().enumerate() {
			match best {
				None => best = Some(idx),
				Some(b) if solution.score > entry[b].score => best = Some(idx),
				_ => {}
			}
		}

		let idx = best?;
		entry[idx].selected = true;
		debug!(%intent_hash, solver = %entry[idx].solver, "solution selected");
		Some(entry[idx].clone())
	}

	/// Clears the selected flag, used when a winner's payout failed and the
	/// intent stays open.
	pub fn clear_selected(&self, intent_hash: &IntentHash) {
		if let Some(mut entry) = self.solutions.get_mut(intent_hash) {
			for solution in entry.iter_mut() {
				solution.selected = false;
			}
		}
	}

	pub fn solution_count(&self, intent_hash: &IntentHash) -> usize {
		self.solutions
			.get(intent_hash)
			.map(|v| v.len())
			.unwrap_or(0)
	}

	/// All solutions for an intent, in submission order.
	pub fn solutions_for(&self, intent_hash: &IntentHash) -> Vec<Solution> {
		self.solutions
			.get(intent_hash)
			.map(|v| v.clone())
			.unwrap_or_default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use settle_escrow::implementations::memory::MemoryEscrow;
	use settle_types::{Intent, ManualClock, U256};

	fn addr(n: u8) -> Address {
		Address::repeat_byte(n)
	}

	struct Fixture {
		escrow: Arc<MemoryEscrow>,
		clock: Arc<ManualClock>,
		intents: Arc<IntentRegistry>,
		solvers: Arc<SolverRegistry>,
		auction: SolutionAuction,
	}

	fn setup() -> Fixture {
		let escrow = Arc::new(MemoryEscrow::new());
		let clock = Arc::new(ManualClock::new(1_000));
		let intents = Arc::new(IntentRegistry::new(escrow.clone(), clock.clone()));
		let solvers = Arc::new(SolverRegistry::new(
			escrow.clone(),
			addr(0xee),
			U256::from(100),
		));
		let auction = SolutionAuction::new(
			intents.clone(),
			solvers.clone(),
			clock.clone(),
			500_000,
		);
		Fixture {
			escrow,
			clock,
			intents,
			solvers,
			auction,
		}
	}

	async fn bonded_solver(f: &Fixture, n: u8) -> Address {
		let solver = addr(n);
		f.escrow.fund(solver, addr(0xee), U256::from(100));
		f.solvers.register(solver, U256::from(100)).await.unwrap();
		solver
	}

	async fn open_intent(f: &Fixture, owner: u8, sell: u64, min_buy: u64) -> Intent {
		let owner = addr(owner);
		let (dai, usdc) = (addr(10), addr(11));
		f.escrow.fund(owner, dai, U256::from(sell));
		f.intents
			.submit(owner, dai, usdc, U256::from(sell), U256::from(min_buy), 4_600, None)
			.await
			.unwrap()
	}

	#[tokio::test]
	async fn submit_rejects_unbonded_solver() {
		let f = setup();
		let intent = open_intent(&f, 1, 10, 5).await;
		let err = f
			.auction
			.submit(addr(9), intent.intent_hash, U256::from(6), 100)
			.unwrap_err();
		assert!(matches!(err, AuctionError::NotApprovedSolver));
	}

	#[tokio::test]
	async fn submit_rejects_below_minimum() {
		let f = setup();
		let solver = bonded_solver(&f, 5).await;
		let intent = open_intent(&f, 1, 10, 5).await;

		let err = f
			.auction
			.submit(solver, intent.intent_hash, U256::from(4), 100)
			.unwrap_err();
		assert!(matches!(err, AuctionError::BelowMinimum));
		assert_eq!(f.auction.solution_count(&intent.intent_hash), 0);
	}

	#[tokio::test]
	async fn submit_rejects_expired_intent() {
		let f = setup();
		let solver = bonded_solver(&f, 5).await;
		let intent = open_intent(&f, 1, 10, 5).await;

		f.clock.set(4_600);
		let err = f
			.auction
			.submit(solver, intent.intent_hash, U256::from(6), 100)
			.unwrap_err();
		assert!(matches!(err, AuctionError::Expired));
	}

	#[tokio::test]
	async fn submit_rejects_final_intent() {
		let f = setup();
		let solver = bonded_solver(&f, 5).await;
		let intent = open_intent(&f, 1, 10, 5).await;
		f.intents.set_executed(&intent.intent_hash).unwrap();

		let err = f
			.auction
			.submit(solver, intent.intent_hash, U256::from(6), 100)
			.unwrap_err();
		assert!(matches!(err, AuctionError::IntentFinal));
	}

	#[tokio::test]
	async fn higher_buy_amount_wins() {
		let f = setup();
		let y = bonded_solver(&f, 5).await;
		let z = bonded_solver(&f, 6).await;
		let intent = open_intent(&f, 1, 10, 5).await;

		f.auction
			.submit(y, intent.intent_hash, U256::from(96), 100)
			.unwrap();
		f.auction
			.submit(z, intent.intent_hash, U256::from(98), 100)
			.unwrap();

		let winner = f.auction.select_best(&intent.intent_hash).unwrap();
		assert_eq!(winner.solver, z);
		assert!(winner.selected);
	}

	#[tokio::test]
	async fn tie_goes_to_earliest_submission() {
		let f = setup();
		let y = bonded_solver(&f, 5).await;
		let z = bonded_solver(&f, 6).await;
		let intent = open_intent(&f, 1, 10, 5).await;

		f.auction
			.submit(y, intent.intent_hash, U256::from(98), 100)
			.unwrap();
		f.auction
			.submit(z, intent.intent_hash, U256::from(98), 100)
			.unwrap();

		let winner = f.auction.select_best(&intent.intent_hash).unwrap();
		assert_eq!(winner.solver, y);
	}

	#[tokio::test]
	async fn gas_penalty_can_flip_the_winner() {
		let f = setup();
		let y = bonded_solver(&f, 5).await;
		let z = bonded_solver(&f, 6).await;
		let intent = open_intent(&f, 1, 100, 5).await;

		// z offers slightly more but blows the gas threshold.
		f.auction
			.submit(y, intent.intent_hash, U256::from(98), 100)
			.unwrap();
		f.auction
			.submit(z, intent.intent_hash, U256::from(100), 600_000)
			.unwrap();

		let winner = f.auction.select_best(&intent.intent_hash).unwrap();
		assert_eq!(winner.solver, y);
	}

	#[tokio::test]
	async fn selection_is_repeatable() {
		let f = setup();
		let y = bonded_solver(&f, 5).await;
		let z = bonded_solver(&f, 6).await;
		let intent = open_intent(&f, 1, 10, 5).await;

		f.auction
			.submit(y, intent.intent_hash, U256::from(96), 100)
			.unwrap();
		f.auction
			.submit(z, intent.intent_hash, U256::from(98), 100)
			.unwrap();

		let first = f.auction.select_best(&intent.intent_hash).unwrap();
		let second = f.auction.select_best(&intent.intent_hash).unwrap();
		assert_eq!(first.solver, second.solver);
		assert_eq!(first.score, second.score);
	}

	#[tokio::test]
	async fn select_best_returns_none_without_solutions() {
		let f = setup();
		let intent = open_intent(&f, 1, 10, 5).await;
		assert!(f.auction.select_best(&intent.intent_hash).is_none());
	}
}

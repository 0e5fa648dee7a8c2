//! Settlement orchestration.
//!
//! The engine is the single entry point for the outer system: submission,
//! cancellation, solver registration, solution submission, settlement and
//! queries all go through here. Settlement for a batch runs to completion
//! exactly once; individual transfer failures are isolated to the affected
//! intent rather than rolling back the whole batch.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::scheduler::BatchScheduler;
use crate::EngineError;
use settle_auction::{plan_matches, PlannedMatch, SolutionAuction};
use settle_escrow::EscrowPort;
use settle_registry::{IntentRegistry, SolverRegistry};
use settle_storage::StorageService;
use settle_types::{
	Address, Amount, AssetId, BatchId, BatchInfo, Clock, CowMatch, EngineEvent, EventBus, Intent,
	IntentHash, SettlementReport, Solution, Timestamp,
};

pub struct SettlementEngine {
	pub(crate) intents: Arc<IntentRegistry>,
	pub(crate) solvers: Arc<SolverRegistry>,
	pub(crate) auction: Arc<SolutionAuction>,
	pub(crate) scheduler: BatchScheduler,
	pub(crate) escrow: Arc<dyn EscrowPort>,
	pub(crate) clock: Arc<dyn Clock>,
	pub(crate) storage: Arc<StorageService>,
	pub(crate) events: EventBus,
}

impl SettlementEngine {
	/// Submits a new intent into the current batch window.
	///
	/// Escrow is debited before the intent is assigned; if the window is
	/// full the escrow is returned and the submission rejected.
	#[allow(clippy::too_many_arguments)]
	pub async fn submit_intent(
		&self,
		owner: Address,
		sell_asset: AssetId,
		buy_asset: AssetId,
		sell_amount: Amount,
		min_buy_amount: Amount,
		deadline: Timestamp,
		receiver: Option<Address>,
	) -> Result<IntentHash, EngineError> {
		let intent = self
			.intents
			.submit(
				owner,
				sell_asset,
				buy_asset,
				sell_amount,
				min_buy_amount,
				deadline,
				receiver,
			)
			.await?;

		let batch_id = match self.scheduler.assign(intent.intent_hash).await {
			Ok(id) => id,
			Err(e) => {
				// Window full: undo the escrow and reject.
				if let Err(cancel_err) = self.intents.cancel(intent.intent_hash, owner).await {
					error!(
						intent_hash = %intent.intent_hash,
						error = %cancel_err,
						"failed to refund intent rejected by scheduler"
					);
				}
				return Err(e.into());
			}
		};

		self.events.publish(EngineEvent::IntentSubmitted {
			intent_hash: intent.intent_hash,
			owner,
			batch_id,
		});
		Ok(intent.intent_hash)
	}

	/// Cancels an open intent, refunding its escrow in full.
	pub async fn cancel_intent(
		&self,
		intent_hash: IntentHash,
		caller: Address,
	) -> Result<(), EngineError> {
		let refunded = self.intents.cancel(intent_hash, caller).await?;
		self.events.publish(EngineEvent::IntentCancelled {
			intent_hash,
			refunded,
		});
		Ok(())
	}

	/// Registers a bonded solver account.
	pub async fn register_solver(
		&self,
		solver: Address,
		bond_amount: Amount,
	) -> Result<(), EngineError> {
		self.solvers.register(solver, bond_amount).await?;
		self.events.publish(EngineEvent::SolverRegistered {
			solver,
			bond: bond_amount,
		});
		Ok(())
	}

	/// Accepts a solver's solution for an open intent.
	pub async fn submit_solution(
		&self,
		solver: Address,
		intent_hash: IntentHash,
		buy_amount: Amount,
		execution_gas_estimate: u64,
	) -> Result<(), EngineError> {
		let solution =
			self.auction
				.submit(solver, intent_hash, buy_amount, execution_gas_estimate)?;
		self.events.publish(EngineEvent::SolutionSubmitted {
			intent_hash,
			solver,
			buy_amount,
			score: solution.score,
		});
		Ok(())
	}

	/// Settles a closed batch: CoW matching first, then the solver auction
	/// for whatever remains, then commits the outcome.
	///
	/// Precondition violations reject with no side effects. After the batch
	/// closes, a transfer failure aborts only the affected intent (it stays
	/// open); matches and executions already applied are not reverted.
	pub async fn settle_batch(&self, batch_id: BatchId) -> Result<SettlementReport, EngineError> {
		let hashes = self.scheduler.begin_settlement(batch_id).await?;
		info!(batch_id, intents = hashes.len(), "settling batch");

		let mut executed_count = 0usize;
		let mut cow_match_count = 0usize;

		// Pass 1: direct peer-to-peer matches, no solver involved. Intents
		// whose deadline passed before settlement never match; their owners
		// reclaim escrow through an explicit cancel.
		let now = self.clock.now();
		let open: Vec<Intent> = self
			.intents
			.open_intents(&hashes)
			.into_iter()
			.filter(|intent| !intent.is_expired(now))
			.collect();
		for plan in plan_matches(&open) {
			match self.execute_cow_match(batch_id, &plan).await {
				Ok(()) => {
					executed_count += 2;
					cow_match_count += 1;
				}
				Err(e) => {
					warn!(
						intent_a = %plan.intent_a,
						intent_b = %plan.intent_b,
						error = %e,
						"cow match failed, both intents stay open"
					);
				}
			}
		}

		// Pass 2: best solver solution per remaining intent.
		for intent_hash in &hashes {
			let Some(intent) = self.intents.get(intent_hash) else {
				continue;
			};
			if !intent.is_open() {
				continue;
			}
			if intent.is_expired(now) {
				// Lazy expiry: skipped, never auto-cancelled. The owner
				// reclaims escrow through an explicit cancel.
				debug!(%intent_hash, "skipping expired intent");
				continue;
			}
			let Some(winner) = self.auction.select_best(intent_hash) else {
				continue;
			};
			match self.execute_solution(&intent, &winner).await {
				Ok(()) => executed_count += 1,
				Err(e) => {
					self.auction.clear_selected(intent_hash);
					warn!(%intent_hash, solver = %winner.solver, error = %e, "solution execution failed, intent stays open");
				}
			}
		}

		let report = SettlementReport {
			batch_id,
			executed_count,
			cow_match_count,
		};

		// Audit record; settlement already committed, so failure here only
		// loses the persisted copy.
		if let Some(batch) = self.scheduler.batch(batch_id).await {
			if let Err(e) = self
				.storage
				.store("batches", &batch_id.to_string(), &batch)
				.await
			{
				warn!(batch_id, error = %e, "failed to persist batch audit record");
			}
		}
		if let Err(e) = self
			.storage
			.store("reports", &batch_id.to_string(), &report)
			.await
		{
			warn!(batch_id, error = %e, "failed to persist settlement report");
		}

		self.events.publish(EngineEvent::BatchSettled { report });
		info!(
			batch_id,
			executed = executed_count,
			cow_matches = cow_match_count,
			"batch settled"
		);
		Ok(report)
	}

	/// Executes one planned CoW pairing: custody pays each receiver the
	/// matched amount of the counterparty's sell asset.
	async fn execute_cow_match(
		&self,
		batch_id: BatchId,
		plan: &PlannedMatch,
	) -> Result<(), EngineError> {
		let a = self
			.intents
			.get(&plan.intent_a)
			.ok_or(settle_registry::RegistryError::UnknownIntent)?;
		let b = self
			.intents
			.get(&plan.intent_b)
			.ok_or(settle_registry::RegistryError::UnknownIntent)?;
		let amount = plan.matched_amount;

		// Claim both legs before any funds move: a cancel racing this match
		// must either win outright or see a final state, never refund escrow
		// that is also being paid out.
		self.intents.set_executed(&plan.intent_a)?;
		if let Err(e) = self.intents.set_executed(&plan.intent_b) {
			self.intents.release_execution(&plan.intent_a);
			return Err(e.into());
		}

		// What `a` sells goes to `b`'s receiver, and vice versa.
		if let Err(e) = self.escrow.credit(b.receiver, a.sell_asset, amount).await {
			self.intents.release_execution(&plan.intent_a);
			self.intents.release_execution(&plan.intent_b);
			return Err(e.into());
		}
		if let Err(e) = self.escrow.credit(a.receiver, b.sell_asset, amount).await {
			// Pull the first leg back so the pair stays unsettled whole.
			if let Err(undo) = self.escrow.debit(b.receiver, a.sell_asset, amount).await {
				error!(
					intent_a = %plan.intent_a,
					intent_b = %plan.intent_b,
					error = %undo,
					"failed to reverse first leg of cow match"
				);
			}
			self.intents.release_execution(&plan.intent_a);
			self.intents.release_execution(&plan.intent_b);
			return Err(e.into());
		}

		let record = CowMatch {
			batch_id,
			intent_a: plan.intent_a,
			intent_b: plan.intent_b,
			matched_amount: amount,
		};
		if let Err(e) = self
			.storage
			.store(
				"cow_matches",
				&format!("{}:{}", plan.intent_a, plan.intent_b),
				&record,
			)
			.await
		{
			warn!(error = %e, "failed to persist cow match record");
		}

		self.events.publish(EngineEvent::CowMatchFound {
			batch_id,
			intent_a: plan.intent_a,
			intent_b: plan.intent_b,
			matched_amount: amount,
		});
		self.events.publish(EngineEvent::IntentExecuted {
			intent_hash: plan.intent_a,
			solver: None,
			buy_amount: amount,
		});
		self.events.publish(EngineEvent::IntentExecuted {
			intent_hash: plan.intent_b,
			solver: None,
			buy_amount: amount,
		});
		info!(
			intent_a = %plan.intent_a,
			intent_b = %plan.intent_b,
			amount = %amount,
			"cow match executed"
		);
		Ok(())
	}

	/// Executes a winning solution: the solver funds the buy side, the
	/// receiver is paid, and the solver collects the escrowed sell side.
	async fn execute_solution(
		&self,
		intent: &Intent,
		winner: &Solution,
	) -> Result<(), EngineError> {
		let intent_hash = intent.intent_hash;

		// Claim before any funds move; released again if a transfer fails.
		self.intents.set_executed(&intent_hash)?;

		if let Err(source) = self
			.escrow
			.debit(winner.solver, intent.buy_asset, winner.buy_amount)
			.await
		{
			self.intents.release_execution(&intent_hash);
			return Err(EngineError::SolverPayoutFailed {
				intent_hash,
				source,
			});
		}

		if let Err(e) = self
			.escrow
			.credit(intent.receiver, intent.buy_asset, winner.buy_amount)
			.await
		{
			if let Err(undo) = self
				.escrow
				.credit(winner.solver, intent.buy_asset, winner.buy_amount)
				.await
			{
				error!(%intent_hash, error = %undo, "failed to return solver funds");
			}
			self.intents.release_execution(&intent_hash);
			return Err(e.into());
		}

		if let Err(e) = self
			.escrow
			.credit(winner.solver, intent.sell_asset, intent.sell_amount)
			.await
		{
			// Unwind both prior legs before giving up on this intent.
			if let Err(undo) = self
				.escrow
				.debit(intent.receiver, intent.buy_asset, winner.buy_amount)
				.await
			{
				error!(%intent_hash, error = %undo, "failed to reverse receiver payment");
			} else if let Err(undo) = self
				.escrow
				.credit(winner.solver, intent.buy_asset, winner.buy_amount)
				.await
			{
				error!(%intent_hash, error = %undo, "failed to return solver funds");
			}
			self.intents.release_execution(&intent_hash);
			return Err(e.into());
		}

		self.solvers.accrue_score(&winner.solver, winner.score);

		if let Err(e) = self
			.storage
			.store("executions", &intent_hash.to_string(), winner)
			.await
		{
			warn!(%intent_hash, error = %e, "failed to persist execution record");
		}

		self.events.publish(EngineEvent::IntentExecuted {
			intent_hash,
			solver: Some(winner.solver),
			buy_amount: winner.buy_amount,
		});
		info!(
			%intent_hash,
			solver = %winner.solver,
			buy_amount = %winner.buy_amount,
			"intent executed via auction"
		);
		Ok(())
	}

	// Query surface

	pub fn get_intent(&self, intent_hash: &IntentHash) -> Option<Intent> {
		self.intents.get(intent_hash)
	}

	pub async fn current_batch_info(&self) -> BatchInfo {
		self.scheduler.current_batch_info().await
	}

	pub fn solution_count(&self, intent_hash: &IntentHash) -> usize {
		self.auction.solution_count(intent_hash)
	}

	pub fn solver_record(&self, solver: &Address) -> Option<settle_types::SolverRecord> {
		self.solvers.get(solver)
	}

	pub fn events(&self) -> &EventBus {
		&self.events
	}
}

//! Intent registry: submission, cancellation, checked state transitions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, warn};

use crate::RegistryError;
use settle_escrow::EscrowPort;
use settle_types::{
	compute_intent_hash, Address, Amount, AssetId, Clock, Intent, IntentHash, IntentState,
	Timestamp,
};

/// Stores submitted intents keyed by content hash.
///
/// Escrow is debited before an intent becomes visible, so every `Open`
/// intent in the map is fully funded.
pub struct IntentRegistry {
	intents: DashMap<IntentHash, Intent>,
	nonce: AtomicU64,
	escrow: Arc<dyn EscrowPort>,
	clock: Arc<dyn Clock>,
}

impl IntentRegistry {
	pub fn new(escrow: Arc<dyn EscrowPort>, clock: Arc<dyn Clock>) -> Self {
		Self {
			intents: DashMap::new(),
			nonce: AtomicU64::new(0),
			escrow,
			clock,
		}
	}

	/// Validates, escrows and stores a new intent. Returns the stored copy.
	#[allow(clippy::too_many_arguments)]
	pub async fn submit(
		&self,
		owner: Address,
		sell_asset: AssetId,
		buy_asset: AssetId,
		sell_amount: Amount,
		min_buy_amount: Amount,
		deadline: Timestamp,
		receiver: Option<Address>,
	) -> Result<Intent, RegistryError> {
		if sell_amount.is_zero() || min_buy_amount.is_zero() {
			return Err(RegistryError::InvalidAmount);
		}
		if sell_asset == buy_asset {
			return Err(RegistryError::SameAsset);
		}
		let now = self.clock.now();
		if deadline <= now {
			return Err(RegistryError::InvalidDeadline);
		}

		let receiver = receiver.unwrap_or(owner);
		let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
		let intent_hash = compute_intent_hash(
			&owner,
			&sell_asset,
			&buy_asset,
			&sell_amount,
			&min_buy_amount,
			deadline,
			&receiver,
			nonce,
		);

		// Funds move first; the intent only becomes visible fully escrowed.
		self.escrow.debit(owner, sell_asset, sell_amount).await?;

		let intent = Intent {
			owner,
			sell_asset,
			buy_asset,
			sell_amount,
			min_buy_amount,
			deadline,
			receiver,
			intent_hash,
			state: IntentState::Open,
			submitted_at: now,
		};
		self.intents.insert(intent_hash, intent.clone());

		info!(intent_hash = %intent_hash, %owner, "intent submitted");
		Ok(intent)
	}

	/// Cancels an `Open` intent and refunds its escrow in full.
	///
	/// Cancellation is unconditional while `Open`; there is no deadline
	/// check, since an unexpired but unwanted intent must still be
	/// cancellable.
	pub async fn cancel(
		&self,
		intent_hash: IntentHash,
		caller: Address,
	) -> Result<Amount, RegistryError> {
		// Claim the intent synchronously so a concurrent cancel or
		// settlement cannot refund twice.
		let (owner, sell_asset, sell_amount) = {
			let mut entry = self
				.intents
				.get_mut(&intent_hash)
				.ok_or(RegistryError::UnknownIntent)?;
			if entry.owner != caller {
				return Err(RegistryError::NotOwner);
			}
			if entry.state.is_final() {
				return Err(RegistryError::AlreadyFinal);
			}
			entry.state = IntentState::Cancelled;
			(entry.owner, entry.sell_asset, entry.sell_amount)
		};

		if let Err(e) = self.escrow.credit(owner, sell_asset, sell_amount).await {
			// Refund failed: release the claim so the owner can retry.
			if let Some(mut entry) = self.intents.get_mut(&intent_hash) {
				entry.state = IntentState::Open;
			}
			warn!(intent_hash = %intent_hash, error = %e, "cancel refund failed");
			return Err(e.into());
		}

		info!(intent_hash = %intent_hash, refunded = %sell_amount, "intent cancelled");
		Ok(sell_amount)
	}

	pub fn get(&self, intent_hash: &IntentHash) -> Option<Intent> {
		self.intents.get(intent_hash).map(|i| i.clone())
	}

	/// Marks an `Open` intent as executed.
	///
	/// Settlement calls this before any funds move, so a cancel racing the
	/// execution either wins outright or sees a final state. The transition
	/// is one-way except through [`release_execution`], which undoes a claim
	/// whose transfers never completed.
	///
	/// [`release_execution`]: IntentRegistry::release_execution
	pub fn set_executed(&self, intent_hash: &IntentHash) -> Result<(), RegistryError> {
		let mut entry = self
			.intents
			.get_mut(intent_hash)
			.ok_or(RegistryError::UnknownIntent)?;
		if entry.state.is_final() {
			return Err(RegistryError::AlreadyFinal);
		}
		entry.state = IntentState::Executed;
		Ok(())
	}

	/// Returns an execution claim to `Open` after its transfers failed.
	///
	/// Counterpart of the refund-failure rollback in [`cancel`]; a cancelled
	/// intent is left untouched.
	///
	/// [`cancel`]: IntentRegistry::cancel
	pub fn release_execution(&self, intent_hash: &IntentHash) {
		if let Some(mut entry) = self.intents.get_mut(intent_hash) {
			if entry.state == IntentState::Executed {
				entry.state = IntentState::Open;
			}
		}
	}

	/// Resolves the still-`Open` intents among `hashes`, preserving order.
	pub fn open_intents(&self, hashes: &[IntentHash]) -> Vec<Intent> {
		hashes
			.iter()
			.filter_map(|h| self.get(h))
			.filter(|i| i.is_open())
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use settle_escrow::implementations::memory::MemoryEscrow;
	use settle_types::{ManualClock, U256};

	fn addr(n: u8) -> Address {
		Address::repeat_byte(n)
	}

	fn setup() -> (Arc<MemoryEscrow>, Arc<ManualClock>, IntentRegistry) {
		let escrow = Arc::new(MemoryEscrow::new());
		let clock = Arc::new(ManualClock::new(1_000));
		let registry = IntentRegistry::new(escrow.clone(), clock.clone());
		(escrow, clock, registry)
	}

	#[tokio::test]
	async fn submit_debits_escrow_and_stores_open_intent() {
		let (escrow, _, registry) = setup();
		let (alice, usdc, weth) = (addr(1), addr(10), addr(11));
		escrow.fund(alice, usdc, U256::from(100));

		let intent = registry
			.submit(alice, usdc, weth, U256::from(100), U256::from(50), 2_000, None)
			.await
			.unwrap();

		assert_eq!(intent.state, IntentState::Open);
		assert_eq!(intent.receiver, alice);
		assert_eq!(escrow.balance_of(alice, usdc), U256::ZERO);
		assert_eq!(escrow.custody_of(usdc), U256::from(100));
		assert!(registry.get(&intent.intent_hash).is_some());
	}

	#[tokio::test]
	async fn submit_rejects_zero_amount_without_debit() {
		let (escrow, _, registry) = setup();
		let (alice, usdc, weth) = (addr(1), addr(10), addr(11));
		escrow.fund(alice, usdc, U256::from(100));

		let err = registry
			.submit(alice, usdc, weth, U256::ZERO, U256::from(50), 2_000, None)
			.await
			.unwrap_err();
		assert!(matches!(err, RegistryError::InvalidAmount));
		assert_eq!(escrow.balance_of(alice, usdc), U256::from(100));
	}

	#[tokio::test]
	async fn submit_rejects_same_asset_and_past_deadline() {
		let (_, _, registry) = setup();
		let (alice, usdc) = (addr(1), addr(10));

		let err = registry
			.submit(alice, usdc, usdc, U256::from(1), U256::from(1), 2_000, None)
			.await
			.unwrap_err();
		assert!(matches!(err, RegistryError::SameAsset));

		let err = registry
			.submit(alice, usdc, addr(11), U256::from(1), U256::from(1), 1_000, None)
			.await
			.unwrap_err();
		assert!(matches!(err, RegistryError::InvalidDeadline));
	}

	#[tokio::test]
	async fn identical_intents_get_distinct_hashes() {
		let (escrow, _, registry) = setup();
		let (alice, usdc, weth) = (addr(1), addr(10), addr(11));
		escrow.fund(alice, usdc, U256::from(200));

		let a = registry
			.submit(alice, usdc, weth, U256::from(100), U256::from(50), 2_000, None)
			.await
			.unwrap();
		let b = registry
			.submit(alice, usdc, weth, U256::from(100), U256::from(50), 2_000, None)
			.await
			.unwrap();
		assert_ne!(a.intent_hash, b.intent_hash);
	}

	#[tokio::test]
	async fn cancel_refunds_and_finalizes() {
		let (escrow, _, registry) = setup();
		let (alice, usdc, weth) = (addr(1), addr(10), addr(11));
		escrow.fund(alice, usdc, U256::from(100));

		let intent = registry
			.submit(alice, usdc, weth, U256::from(100), U256::from(50), 2_000, None)
			.await
			.unwrap();

		let refunded = registry.cancel(intent.intent_hash, alice).await.unwrap();
		assert_eq!(refunded, U256::from(100));
		assert_eq!(escrow.balance_of(alice, usdc), U256::from(100));
		assert_eq!(
			registry.get(&intent.intent_hash).unwrap().state,
			IntentState::Cancelled
		);

		// Second cancel is an idempotent rejection.
		let err = registry.cancel(intent.intent_hash, alice).await.unwrap_err();
		assert!(matches!(err, RegistryError::AlreadyFinal));
		assert_eq!(escrow.balance_of(alice, usdc), U256::from(100));
	}

	#[tokio::test]
	async fn cancel_rejects_non_owner() {
		let (escrow, _, registry) = setup();
		let (alice, mallory, usdc, weth) = (addr(1), addr(2), addr(10), addr(11));
		escrow.fund(alice, usdc, U256::from(100));

		let intent = registry
			.submit(alice, usdc, weth, U256::from(100), U256::from(50), 2_000, None)
			.await
			.unwrap();

		let err = registry.cancel(intent.intent_hash, mallory).await.unwrap_err();
		assert!(matches!(err, RegistryError::NotOwner));
		assert!(registry.get(&intent.intent_hash).unwrap().is_open());
	}

	#[tokio::test]
	async fn executed_intent_rejects_further_transitions() {
		let (escrow, _, registry) = setup();
		let (alice, usdc, weth) = (addr(1), addr(10), addr(11));
		escrow.fund(alice, usdc, U256::from(100));

		let intent = registry
			.submit(alice, usdc, weth, U256::from(100), U256::from(50), 2_000, None)
			.await
			.unwrap();

		registry.set_executed(&intent.intent_hash).unwrap();
		let err = registry.set_executed(&intent.intent_hash).unwrap_err();
		assert!(matches!(err, RegistryError::AlreadyFinal));
		let err = registry.cancel(intent.intent_hash, alice).await.unwrap_err();
		assert!(matches!(err, RegistryError::AlreadyFinal));
	}

	#[tokio::test]
	async fn released_execution_claim_reopens_intent() {
		let (escrow, _, registry) = setup();
		let (alice, usdc, weth) = (addr(1), addr(10), addr(11));
		escrow.fund(alice, usdc, U256::from(100));

		let intent = registry
			.submit(alice, usdc, weth, U256::from(100), U256::from(50), 2_000, None)
			.await
			.unwrap();

		// While claimed, the intent is final to everyone else.
		registry.set_executed(&intent.intent_hash).unwrap();
		let err = registry.cancel(intent.intent_hash, alice).await.unwrap_err();
		assert!(matches!(err, RegistryError::AlreadyFinal));

		// Released: open again and cancellable with a full refund.
		registry.release_execution(&intent.intent_hash);
		assert!(registry.get(&intent.intent_hash).unwrap().is_open());
		let refunded = registry.cancel(intent.intent_hash, alice).await.unwrap();
		assert_eq!(refunded, U256::from(100));

		// Release never resurrects a cancelled intent.
		registry.release_execution(&intent.intent_hash);
		assert_eq!(
			registry.get(&intent.intent_hash).unwrap().state,
			IntentState::Cancelled
		);
	}
}

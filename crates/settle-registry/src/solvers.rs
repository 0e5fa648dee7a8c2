//! Solver registry: bonding and eligibility.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, warn};

use crate::RegistryError;
use settle_escrow::EscrowPort;
use settle_types::{Address, Amount, AssetId, SolverRecord, U256};

/// Tracks bonded solver accounts and their cumulative quality scores.
pub struct SolverRegistry {
	solvers: DashMap<Address, SolverRecord>,
	escrow: Arc<dyn EscrowPort>,
	/// Asset the bond is posted in.
	bond_asset: AssetId,
	min_bond: Amount,
}

impl SolverRegistry {
	pub fn new(escrow: Arc<dyn EscrowPort>, bond_asset: AssetId, min_bond: Amount) -> Self {
		Self {
			solvers: DashMap::new(),
			escrow,
			bond_asset,
			min_bond,
		}
	}

	/// Registers a solver, escrowing its bond. One registration per account;
	/// partial withdrawal is not supported here.
	pub async fn register(
		&self,
		solver: Address,
		bond_amount: Amount,
	) -> Result<(), RegistryError> {
		if bond_amount < self.min_bond {
			return Err(RegistryError::BondTooLow {
				posted: bond_amount,
				required: self.min_bond,
			});
		}
		if self.solvers.contains_key(&solver) {
			return Err(RegistryError::AlreadyRegistered);
		}

		self.escrow.debit(solver, self.bond_asset, bond_amount).await?;

		// A racing second registration lost to us on the debit; return its
		// bond rather than stacking it.
		match self.solvers.entry(solver) {
			dashmap::mapref::entry::Entry::Occupied(_) => {
				if let Err(e) = self.escrow.credit(solver, self.bond_asset, bond_amount).await {
					warn!(%solver, error = %e, "bond return failed for duplicate registration");
				}
				Err(RegistryError::AlreadyRegistered)
			}
			dashmap::mapref::entry::Entry::Vacant(entry) => {
				entry.insert(SolverRecord::new(solver, bond_amount));
				info!(%solver, bond = %bond_amount, "solver registered");
				Ok(())
			}
		}
	}

	/// Whether the solver's bond currently meets the minimum. Re-checked at
	/// solution submission time since slashing elsewhere could reduce it.
	pub fn slash_eligible(&self, solver: &Address) -> bool {
		self.solvers
			.get(solver)
			.map(|r| r.bond >= self.min_bond)
			.unwrap_or(false)
	}

	/// Adds an executed solution's score to the solver's running total.
	pub fn accrue_score(&self, solver: &Address, score: U256) {
		if let Some(mut record) = self.solvers.get_mut(solver) {
			record.cumulative_score += score;
		}
	}

	pub fn get(&self, solver: &Address) -> Option<SolverRecord> {
		self.solvers.get(solver).map(|r| r.clone())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use settle_escrow::implementations::memory::MemoryEscrow;

	fn addr(n: u8) -> Address {
		Address::repeat_byte(n)
	}

	fn setup(min_bond: u64) -> (Arc<MemoryEscrow>, SolverRegistry) {
		let escrow = Arc::new(MemoryEscrow::new());
		let registry = SolverRegistry::new(escrow.clone(), addr(0xee), U256::from(min_bond));
		(escrow, registry)
	}

	#[tokio::test]
	async fn register_escrows_bond() {
		let (escrow, registry) = setup(100);
		let solver = addr(5);
		escrow.fund(solver, addr(0xee), U256::from(150));

		registry.register(solver, U256::from(150)).await.unwrap();

		assert_eq!(escrow.balance_of(solver, addr(0xee)), U256::ZERO);
		assert!(registry.slash_eligible(&solver));
		assert_eq!(registry.get(&solver).unwrap().bond, U256::from(150));
	}

	#[tokio::test]
	async fn register_rejects_low_bond_without_debit() {
		let (escrow, registry) = setup(100);
		let solver = addr(5);
		escrow.fund(solver, addr(0xee), U256::from(99));

		let err = registry.register(solver, U256::from(99)).await.unwrap_err();
		assert!(matches!(err, RegistryError::BondTooLow { .. }));
		assert_eq!(escrow.balance_of(solver, addr(0xee)), U256::from(99));
		assert!(!registry.slash_eligible(&solver));
	}

	#[tokio::test]
	async fn register_rejects_duplicates() {
		let (escrow, registry) = setup(100);
		let solver = addr(5);
		escrow.fund(solver, addr(0xee), U256::from(300));

		registry.register(solver, U256::from(100)).await.unwrap();
		let err = registry.register(solver, U256::from(100)).await.unwrap_err();
		assert!(matches!(err, RegistryError::AlreadyRegistered));
		// Only the first bond stays escrowed.
		assert_eq!(escrow.balance_of(solver, addr(0xee)), U256::from(200));
	}

	#[tokio::test]
	async fn unknown_solver_is_not_eligible() {
		let (_, registry) = setup(100);
		assert!(!registry.slash_eligible(&addr(9)));
	}

	#[tokio::test]
	async fn accrue_score_accumulates() {
		let (escrow, registry) = setup(100);
		let solver = addr(5);
		escrow.fund(solver, addr(0xee), U256::from(100));
		registry.register(solver, U256::from(100)).await.unwrap();

		registry.accrue_score(&solver, U256::from(10));
		registry.accrue_score(&solver, U256::from(32));
		assert_eq!(registry.get(&solver).unwrap().cumulative_score, U256::from(42));
	}
}

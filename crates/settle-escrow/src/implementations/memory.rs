//! In-memory escrow backend.
//!
//! Tracks per-account asset balances and a separate custody ledger in
//! `DashMap`s. Used by tests and the demo service; a production deployment
//! would implement [`EscrowPort`](crate::EscrowPort) against a real asset
//! ledger.

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::{EscrowError, EscrowPort};
use settle_types::{Address, Amount, AssetId, U256};

/// Balance-map escrow. Debits move funds from the account map into the
/// custody map; credits move them back out.
#[derive(Default)]
pub struct MemoryEscrow {
	balances: DashMap<(Address, AssetId), Amount>,
	custody: DashMap<AssetId, Amount>,
}

impl MemoryEscrow {
	pub fn new() -> Self {
		Self::default()
	}

	/// Seeds an account balance. Test/demo setup only.
	pub fn fund(&self, account: Address, asset: AssetId, amount: Amount) {
		let mut entry = self.balances.entry((account, asset)).or_insert(U256::ZERO);
		*entry += amount;
	}

	pub fn balance_of(&self, account: Address, asset: AssetId) -> Amount {
		self.balances
			.get(&(account, asset))
			.map(|v| *v)
			.unwrap_or(U256::ZERO)
	}

	/// Total amount of `asset` currently held in engine custody.
	pub fn custody_of(&self, asset: AssetId) -> Amount {
		self.custody.get(&asset).map(|v| *v).unwrap_or(U256::ZERO)
	}
}

#[async_trait]
impl EscrowPort for MemoryEscrow {
	async fn debit(
		&self,
		account: Address,
		asset: AssetId,
		amount: Amount,
	) -> Result<(), EscrowError> {
		{
			let mut held = self.balances.entry((account, asset)).or_insert(U256::ZERO);
			if *held < amount {
				return Err(EscrowError::InsufficientFunds {
					account,
					asset,
					held: *held,
					needed: amount,
				});
			}
			*held -= amount;
		}
		*self.custody.entry(asset).or_insert(U256::ZERO) += amount;
		debug!(%account, %asset, %amount, "escrow debit");
		Ok(())
	}

	async fn credit(
		&self,
		account: Address,
		asset: AssetId,
		amount: Amount,
	) -> Result<(), EscrowError> {
		{
			let mut held = self.custody.entry(asset).or_insert(U256::ZERO);
			if *held < amount {
				return Err(EscrowError::CustodyShortfall {
					asset,
					held: *held,
					needed: amount,
				});
			}
			*held -= amount;
		}
		*self.balances.entry((account, asset)).or_insert(U256::ZERO) += amount;
		debug!(%account, %asset, %amount, "escrow credit");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn addr(n: u8) -> Address {
		Address::repeat_byte(n)
	}

	#[tokio::test]
	async fn debit_moves_funds_into_custody() {
		let escrow = MemoryEscrow::new();
		let (alice, usdc) = (addr(1), addr(10));
		escrow.fund(alice, usdc, U256::from(100));

		escrow.debit(alice, usdc, U256::from(60)).await.unwrap();
		assert_eq!(escrow.balance_of(alice, usdc), U256::from(40));
		assert_eq!(escrow.custody_of(usdc), U256::from(60));
	}

	#[tokio::test]
	async fn debit_rejects_insufficient_funds() {
		let escrow = MemoryEscrow::new();
		let (alice, usdc) = (addr(1), addr(10));
		escrow.fund(alice, usdc, U256::from(10));

		let err = escrow.debit(alice, usdc, U256::from(11)).await.unwrap_err();
		assert!(matches!(err, EscrowError::InsufficientFunds { .. }));
		// No partial movement
		assert_eq!(escrow.balance_of(alice, usdc), U256::from(10));
		assert_eq!(escrow.custody_of(usdc), U256::ZERO);
	}

	#[tokio::test]
	async fn credit_rejects_custody_shortfall() {
		let escrow = MemoryEscrow::new();
		let (bob, dai) = (addr(2), addr(11));

		let err = escrow.credit(bob, dai, U256::from(1)).await.unwrap_err();
		assert!(matches!(err, EscrowError::CustodyShortfall { .. }));
	}

	#[tokio::test]
	async fn debit_then_credit_round_trips() {
		let escrow = MemoryEscrow::new();
		let (alice, bob, weth) = (addr(1), addr(2), addr(12));
		escrow.fund(alice, weth, U256::from(5));

		escrow.debit(alice, weth, U256::from(5)).await.unwrap();
		escrow.credit(bob, weth, U256::from(5)).await.unwrap();

		assert_eq!(escrow.balance_of(alice, weth), U256::ZERO);
		assert_eq!(escrow.balance_of(bob, weth), U256::from(5));
		assert_eq!(escrow.custody_of(weth), U256::ZERO);
	}
}

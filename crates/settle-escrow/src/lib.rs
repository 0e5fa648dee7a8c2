//! Escrow capability for the settlement engine.
//!
//! The engine never holds assets itself; it moves them through this port.
//! `debit` pulls an amount from an account into engine custody, `credit`
//! pays an amount out of custody to an account. Both report success or
//! failure explicitly and the engine never assumes a transfer succeeded
//! without checking.

use async_trait::async_trait;
use thiserror::Error;

use settle_types::{Address, Amount, AssetId};

/// Re-export implementations
pub mod implementations {
	pub mod memory;
}

#[derive(Debug, Error)]
pub enum EscrowError {
	/// The account does not hold enough of the asset to cover the debit.
	#[error("insufficient funds: account {account} holds {held} of asset {asset}, needs {needed}")]
	InsufficientFunds {
		account: Address,
		asset: AssetId,
		held: Amount,
		needed: Amount,
	},
	/// Engine custody does not cover the credit. Indicates an accounting bug
	/// or an external drain; surfaced rather than papered over.
	#[error("custody shortfall for asset {asset}: holds {held}, needs {needed}")]
	CustodyShortfall {
		asset: AssetId,
		held: Amount,
		needed: Amount,
	},
	/// The backing transfer mechanism failed.
	#[error("transfer failed: {0}")]
	TransferFailed(String),
}

/// Capability to hold and transfer a fungible asset by token identifier.
#[async_trait]
pub trait EscrowPort: Send + Sync {
	/// Moves `amount` of `asset` from `account` into engine custody.
	async fn debit(&self, account: Address, asset: AssetId, amount: Amount)
		-> Result<(), EscrowError>;

	/// Pays `amount` of `asset` out of engine custody to `account`.
	async fn credit(
		&self,
		account: Address,
		asset: AssetId,
		amount: Amount,
	) -> Result<(), EscrowError>;
}

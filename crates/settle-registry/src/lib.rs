//! Registries owning intent and solver state.
//!
//! Both registries are keyed collections indexed by content hash or account,
//! with one-way checked state transitions. Records are never deleted; a
//! terminal intent stays around as an immutable audit record.

use thiserror::Error;

use settle_escrow::EscrowError;
use settle_types::Amount;

pub mod intents;
pub mod solvers;

pub use intents::IntentRegistry;
pub use solvers::SolverRegistry;

#[derive(Debug, Error)]
pub enum RegistryError {
	/// `sell_amount` or `min_buy_amount` is zero.
	#[error("invalid amount")]
	InvalidAmount,

	/// Deadline is not strictly in the future.
	#[error("invalid deadline")]
	InvalidDeadline,

	/// Sell and buy asset are identical.
	#[error("sell and buy asset are the same")]
	SameAsset,

	/// Caller is not the intent owner.
	#[error("caller is not the intent owner")]
	NotOwner,

	/// The intent already reached a terminal state.
	#[error("intent is already final")]
	AlreadyFinal,

	/// No intent with the given hash exists.
	#[error("unknown intent")]
	UnknownIntent,

	/// The solver account is already registered.
	#[error("solver already registered")]
	AlreadyRegistered,

	/// Posted bond is below the minimum.
	#[error("bond below minimum: posted {posted}, required {required}")]
	BondTooLow { posted: Amount, required: Amount },

	/// An escrow transfer failed; no registry state was changed.
	#[error("escrow: {0}")]
	Escrow(#[from] EscrowError),
}

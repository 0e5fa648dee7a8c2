//! Batch auction settlement engine.
//!
//! Orchestrates the batch life-cycle: intents are assigned to fixed-duration
//! windows, solvers compete during the window, and settlement runs CoW
//! matching first, then the auction, committing transfers through the
//! escrow port.

use thiserror::Error;

use settle_auction::AuctionError;
use settle_escrow::EscrowError;
use settle_registry::RegistryError;
use settle_storage::StorageError;
use settle_types::IntentHash;

pub mod builder;
pub mod engine;
pub mod scheduler;

pub use builder::EngineBuilder;
pub use engine::SettlementEngine;
pub use scheduler::{BatchScheduler, SchedulerError};

#[derive(Debug, Error)]
pub enum EngineError {
	#[error("registry: {0}")]
	Registry(#[from] RegistryError),

	#[error("auction: {0}")]
	Auction(#[from] AuctionError),

	#[error("scheduler: {0}")]
	Scheduler(#[from] SchedulerError),

	#[error("escrow: {0}")]
	Escrow(#[from] EscrowError),

	#[error("storage: {0}")]
	Storage(#[from] StorageError),

	/// The winning solver could not cover its payout. Isolated to the
	/// affected intent during settlement; the intent stays open.
	#[error("solver payout failed for intent {intent_hash}: {source}")]
	SolverPayoutFailed {
		intent_hash: IntentHash,
		#[source]
		source: EscrowError,
	},

	#[error("configuration error: {0}")]
	Config(String),
}

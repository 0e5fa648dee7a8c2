//! Matching and competition for the settlement engine.
//!
//! Two mechanisms fulfill intents: direct Coincidence-of-Wants pairing
//! ([`cow`]) and the competitive solver auction ([`auction`]). Both are
//! deterministic given stored state; settlement order never depends on
//! timing.

use thiserror::Error;

pub mod auction;
pub mod cow;

pub use auction::SolutionAuction;
pub use cow::{plan_matches, PlannedMatch};

#[derive(Debug, Error)]
pub enum AuctionError {
	/// Submitting solver is not registered or its bond fell below minimum.
	#[error("solver is not approved")]
	NotApprovedSolver,

	/// No intent with the given hash exists.
	#[error("unknown intent")]
	UnknownIntent,

	/// The intent already reached a terminal state.
	#[error("intent is final")]
	IntentFinal,

	/// The intent's deadline has passed.
	#[error("intent expired")]
	Expired,

	/// Offered buy amount is below the intent's minimum.
	#[error("buy amount below intent minimum")]
	BelowMinimum,
}

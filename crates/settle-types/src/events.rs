//! Engine events and the broadcast bus carrying them.
//!
//! Every externally observable state change is published here so an outer
//! relay (API layer, WebSocket push, audit logger) can subscribe without the
//! engine taking on any network responsibility.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::batch::{BatchId, SettlementReport};
use crate::common::{Address, Amount, IntentHash, U256};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEvent {
	IntentSubmitted {
		intent_hash: IntentHash,
		owner: Address,
		batch_id: BatchId,
	},
	IntentCancelled {
		intent_hash: IntentHash,
		refunded: Amount,
	},
	SolverRegistered {
		solver: Address,
		bond: Amount,
	},
	SolutionSubmitted {
		intent_hash: IntentHash,
		solver: Address,
		buy_amount: Amount,
		score: U256,
	},
	CowMatchFound {
		batch_id: BatchId,
		intent_a: IntentHash,
		intent_b: IntentHash,
		matched_amount: Amount,
	},
	IntentExecuted {
		intent_hash: IntentHash,
		solver: Option<Address>,
		buy_amount: Amount,
	},
	BatchSettled {
		report: SettlementReport,
	},
}

/// Broadcast bus for engine events.
///
/// Publishing never blocks and never fails the operation that triggered the
/// event; a bus with no subscribers simply drops the message.
pub struct EventBus {
	sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
		self.sender.subscribe()
	}

	pub fn publish(&self, event: EngineEvent) {
		// Send only errors when there are no receivers; that is fine.
		let _ = self.sender.send(event);
	}
}

impl Clone for EventBus {
	fn clone(&self) -> Self {
		Self {
			sender: self.sender.clone(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn publish_reaches_subscriber() {
		let bus = EventBus::new(16);
		let mut rx = bus.subscribe();
		bus.publish(EngineEvent::SolverRegistered {
			solver: Address::repeat_byte(7),
			bond: Amount::from(1_000),
		});
		match rx.recv().await.unwrap() {
			EngineEvent::SolverRegistered { solver, bond } => {
				assert_eq!(solver, Address::repeat_byte(7));
				assert_eq!(bond, Amount::from(1_000));
			}
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[test]
	fn publish_without_subscribers_is_noop() {
		let bus = EventBus::new(4);
		bus.publish(EngineEvent::IntentCancelled {
			intent_hash: IntentHash::ZERO,
			refunded: Amount::from(5),
		});
	}
}

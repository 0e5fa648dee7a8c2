//! Batch window scheduling.
//!
//! Owns the fixed-duration batch windows. Exactly one batch is current at
//! any time; a new window opens lazily when the previous one settles.
//! Assignment and the begin-settlement transition share one lock, so an
//! intent can never land in a batch that has already closed.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use settle_types::{Batch, BatchId, BatchInfo, Clock, IntentHash};

#[derive(Debug, Error)]
pub enum SchedulerError {
	/// No batch with the given id exists.
	#[error("unknown batch")]
	UnknownBatch,

	/// The batch window has not elapsed yet.
	#[error("batch not ready")]
	BatchNotReady,

	/// The batch was already settled (or settlement is in flight).
	#[error("batch already settled")]
	AlreadySettled,

	/// The current batch reached its intent capacity.
	#[error("batch is full")]
	BatchFull,
}

struct SchedulerState {
	batches: HashMap<BatchId, Batch>,
	current: Option<BatchId>,
	next_id: BatchId,
}

pub struct BatchScheduler {
	state: Mutex<SchedulerState>,
	clock: Arc<dyn Clock>,
	batch_duration: u64,
	max_batch_size: usize,
}

impl BatchScheduler {
	pub fn new(clock: Arc<dyn Clock>, batch_duration: u64, max_batch_size: usize) -> Self {
		Self {
			state: Mutex::new(SchedulerState {
				batches: HashMap::new(),
				current: None,
				next_id: 0,
			}),
			clock,
			batch_duration,
			max_batch_size,
		}
	}

	/// Opens a new window if none is current. Must run under the state lock.
	fn ensure_current(&self, state: &mut SchedulerState) -> BatchId {
		if let Some(id) = state.current {
			return id;
		}
		let id = state.next_id;
		state.next_id += 1;
		let now = self.clock.now();
		state.batches.insert(
			id,
			Batch {
				batch_id: id,
				start_time: now,
				end_time: now + self.batch_duration,
				intent_hashes: Vec::new(),
				settled: false,
			},
		);
		state.current = Some(id);
		info!(batch_id = id, start = now, "batch window opened");
		id
	}

	/// Appends an intent to the current batch, opening one if needed.
	pub async fn assign(&self, intent_hash: IntentHash) -> Result<BatchId, SchedulerError> {
		let mut state = self.state.lock().await;
		let id = self.ensure_current(&mut state);
		let batch = state.batches.get_mut(&id).expect("current batch exists");
		if batch.intent_hashes.len() >= self.max_batch_size {
			return Err(SchedulerError::BatchFull);
		}
		batch.intent_hashes.push(intent_hash);
		Ok(id)
	}

	/// Validates the settlement preconditions and atomically closes the
	/// batch, returning its intent list.
	///
	/// Marking `settled` up front is what makes a re-entrant or concurrent
	/// settlement call fail with `AlreadySettled`, and stops submissions
	/// from landing in a window that is being settled.
	pub async fn begin_settlement(
		&self,
		batch_id: BatchId,
	) -> Result<Vec<IntentHash>, SchedulerError> {
		let mut state = self.state.lock().await;
		let now = self.clock.now();
		let batch = state
			.batches
			.get_mut(&batch_id)
			.ok_or(SchedulerError::UnknownBatch)?;
		if batch.settled {
			return Err(SchedulerError::AlreadySettled);
		}
		if !batch.is_ready(now) {
			return Err(SchedulerError::BatchNotReady);
		}
		batch.settled = true;
		let hashes = batch.intent_hashes.clone();
		if state.current == Some(batch_id) {
			state.current = None;
		}
		info!(batch_id, intents = hashes.len(), "batch closed for settlement");
		Ok(hashes)
	}

	/// Snapshot of the current batch, opening one if needed.
	pub async fn current_batch_info(&self) -> BatchInfo {
		let mut state = self.state.lock().await;
		let id = self.ensure_current(&mut state);
		let batch = &state.batches[&id];
		BatchInfo {
			batch_id: batch.batch_id,
			start_time: batch.start_time,
			end_time: batch.end_time,
			intent_count: batch.intent_hashes.len(),
			settled: batch.settled,
		}
	}

	pub async fn batch(&self, batch_id: BatchId) -> Option<Batch> {
		self.state.lock().await.batches.get(&batch_id).cloned()
	}
}

//! Engine assembly from configuration and collaborator ports.

use std::str::FromStr;
use std::sync::Arc;

use crate::engine::SettlementEngine;
use crate::scheduler::BatchScheduler;
use crate::EngineError;
use settle_auction::SolutionAuction;
use settle_config::EngineConfig;
use settle_escrow::EscrowPort;
use settle_registry::{IntentRegistry, SolverRegistry};
use settle_storage::StorageService;
use settle_types::{Address, Clock, EventBus, SystemClock, U256};

/// Builds a [`SettlementEngine`] from its configuration and ports.
///
/// Escrow and storage are required; the clock defaults to wall time.
pub struct EngineBuilder {
	config: EngineConfig,
	escrow: Option<Arc<dyn EscrowPort>>,
	clock: Option<Arc<dyn Clock>>,
	storage: Option<Arc<StorageService>>,
}

impl EngineBuilder {
	pub fn new(config: EngineConfig) -> Self {
		Self {
			config,
			escrow: None,
			clock: None,
			storage: None,
		}
	}

	pub fn with_escrow(mut self, escrow: Arc<dyn EscrowPort>) -> Self {
		self.escrow = Some(escrow);
		self
	}

	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = Some(clock);
		self
	}

	pub fn with_storage(mut self, storage: Arc<StorageService>) -> Self {
		self.storage = Some(storage);
		self
	}

	pub fn build(self) -> Result<SettlementEngine, EngineError> {
		let escrow = self
			.escrow
			.ok_or_else(|| EngineError::Config("escrow port not provided".into()))?;
		let storage = self
			.storage
			.ok_or_else(|| EngineError::Config("storage not provided".into()))?;
		let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

		let bond_asset = Address::from_str(&self.config.bond_asset)
			.map_err(|e| EngineError::Config(format!("invalid bond asset: {}", e)))?;

		let intents = Arc::new(IntentRegistry::new(escrow.clone(), clock.clone()));
		let solvers = Arc::new(SolverRegistry::new(
			escrow.clone(),
			bond_asset,
			U256::from(self.config.min_solver_bond),
		));
		let auction = Arc::new(SolutionAuction::new(
			intents.clone(),
			solvers.clone(),
			clock.clone(),
			self.config.gas_penalty_threshold,
		));
		let scheduler = BatchScheduler::new(
			clock.clone(),
			self.config.batch_duration_secs,
			self.config.max_batch_size,
		);

		Ok(SettlementEngine {
			intents,
			solvers,
			auction,
			scheduler,
			escrow,
			clock,
			storage,
			events: EventBus::new(self.config.event_capacity),
		})
	}
}

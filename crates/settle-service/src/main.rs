use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use settle_config::{Config, ConfigLoader};
use settle_engine::{EngineBuilder, SettlementEngine};
use settle_escrow::implementations::memory::MemoryEscrow;
use settle_storage::{
	implementations::{file::FileStorage, memory::MemoryStorage},
	StorageService,
};
use settle_types::{Clock, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "settle-engine")]
#[command(about = "Intent batch auction settlement engine", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	#[arg(short, long, value_name = "FILE")]
	config: Option<PathBuf>,

	#[arg(long, env = "SETTLE_LOG_LEVEL", default_value = "info")]
	log_level: String,
}

#[derive(Subcommand)]
enum Commands {
	/// Start the settlement engine
	Start,
	/// Validate the configuration file
	Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	setup_tracing(&cli.log_level)?;

	match cli.command {
		Some(Commands::Start) | None => start_engine(cli).await,
		Some(Commands::Validate) => validate_config(cli).await,
	}
}

async fn load_config(cli: &Cli) -> Result<Config> {
	let mut loader = ConfigLoader::new();
	if let Some(path) = &cli.config {
		loader = loader.with_file(path);
	}
	loader.load().await.context("Failed to load configuration")
}

async fn start_engine(cli: Cli) -> Result<()> {
	info!("Starting settlement engine");
	let config = load_config(&cli).await?;

	info!(
		batch_duration_secs = config.engine.batch_duration_secs,
		max_batch_size = config.engine.max_batch_size,
		storage = %config.storage.backend,
		"configuration loaded"
	);

	let storage = build_storage(&config);
	let escrow = Arc::new(MemoryEscrow::new());
	let clock: Arc<dyn Clock> = Arc::new(SystemClock);

	let engine = EngineBuilder::new(config.engine.clone())
		.with_escrow(escrow)
		.with_clock(clock.clone())
		.with_storage(storage)
		.build()
		.context("Failed to build engine")?;
	let engine = Arc::new(engine);

	// Relay every engine event into the log for audit.
	let mut events = engine.events().subscribe();
	let event_task = tokio::spawn(async move {
		while let Ok(event) = events.recv().await {
			info!(?event, "engine event");
		}
	});

	// The batch window is advisory; this ticker is the external trigger
	// that settles a batch once its window has elapsed.
	let ticker_engine = engine.clone();
	let tick_interval = config.service.tick_interval_secs;
	let ticker_task = tokio::spawn(async move {
		let mut ticker =
			tokio::time::interval(tokio::time::Duration::from_secs(tick_interval.max(1)));
		loop {
			ticker.tick().await;
			settle_if_ready(&ticker_engine, clock.as_ref()).await;
		}
	});

	info!("Settlement engine started");

	shutdown_signal().await;
	info!("Shutdown signal received, stopping");

	ticker_task.abort();
	event_task.abort();

	info!("Settlement engine stopped");
	Ok(())
}

async fn settle_if_ready(engine: &SettlementEngine, clock: &dyn Clock) {
	let info = engine.current_batch_info().await;
	if clock.now() < info.end_time {
		return;
	}
	match engine.settle_batch(info.batch_id).await {
		Ok(report) => info!(
			batch_id = report.batch_id,
			executed = report.executed_count,
			cow_matches = report.cow_match_count,
			"batch settled"
		),
		// Raced with another trigger; nothing to do.
		Err(settle_engine::EngineError::Scheduler(_)) => {}
		Err(e) => error!(batch_id = info.batch_id, error = %e, "settlement failed"),
	}
}

fn build_storage(config: &Config) -> Arc<StorageService> {
	let backend: Box<dyn settle_storage::StorageInterface> =
		match config.storage.backend.as_str() {
			"file" => Box::new(FileStorage::new(PathBuf::from(&config.storage.path))),
			_ => Box::new(MemoryStorage::new()),
		};
	Arc::new(StorageService::new(backend))
}

async fn validate_config(cli: Cli) -> Result<()> {
	let config = load_config(&cli).await?;

	info!("Configuration is valid");
	info!(
		batch_duration_secs = config.engine.batch_duration_secs,
		max_batch_size = config.engine.max_batch_size,
		min_solver_bond = config.engine.min_solver_bond,
		gas_penalty_threshold = config.engine.gas_penalty_threshold,
		storage = %config.storage.backend,
		"engine settings"
	);

	Ok(())
}

fn setup_tracing(log_level: &str) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer())
		.init();

	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		signal::ctrl_c()
			.await
			.expect("failed to install Ctrl+C handler");
	};

	#[cfg(unix)]
	let terminate = async {
		signal::unix::signal(signal::unix::SignalKind::terminate())
			.expect("failed to install signal handler")
			.recv()
			.await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}

//! Configuration for the settlement engine and service shell.
//!
//! TOML files with `${VAR}` environment substitution and a small set of
//! environment overrides, validated before use.

use std::env;
use std::path::Path;
use thiserror::Error;

use serde::{Deserialize, Serialize};

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("file not found: {0}")]
	FileNotFound(String),

	#[error("parse error: {0}")]
	ParseError(String),

	#[error("validation error: {0}")]
	ValidationError(String),

	#[error("environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("io error: {0}")]
	IoError(#[from] std::io::Error),
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
	#[serde(default)]
	pub engine: EngineConfig,
	#[serde(default)]
	pub storage: StorageConfig,
	#[serde(default)]
	pub service: ServiceConfig,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			engine: EngineConfig::default(),
			storage: StorageConfig::default(),
			service: ServiceConfig::default(),
		}
	}
}

/// Engine constants: batch window, bonding gate, scoring penalty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
	/// Fixed batch window duration, in seconds.
	#[serde(default = "default_batch_duration_secs")]
	pub batch_duration_secs: u64,
	/// Upper bound on intents per batch, keeping the pairwise scan bounded.
	#[serde(default = "default_max_batch_size")]
	pub max_batch_size: usize,
	/// Minimum bond (base units) a solver must post before its solutions
	/// are accepted.
	#[serde(default = "default_min_solver_bond")]
	pub min_solver_bond: u64,
	/// Asset solver bonds are posted in (hex address).
	#[serde(default = "default_bond_asset")]
	pub bond_asset: String,
	/// Gas estimates above this threshold discount the solution score by 5%.
	#[serde(default = "default_gas_penalty_threshold")]
	pub gas_penalty_threshold: u64,
	/// Capacity of the event broadcast channel.
	#[serde(default = "default_event_capacity")]
	pub event_capacity: usize,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			batch_duration_secs: default_batch_duration_secs(),
			max_batch_size: default_max_batch_size(),
			min_solver_bond: default_min_solver_bond(),
			bond_asset: default_bond_asset(),
			gas_penalty_threshold: default_gas_penalty_threshold(),
			event_capacity: default_event_capacity(),
		}
	}
}

fn default_batch_duration_secs() -> u64 {
	300
}

fn default_max_batch_size() -> usize {
	128
}

fn default_min_solver_bond() -> u64 {
	1_000_000_000_000_000_000
}

fn default_bond_asset() -> String {
	"0x0000000000000000000000000000000000000000".to_string()
}

fn default_gas_penalty_threshold() -> u64 {
	500_000
}

fn default_event_capacity() -> usize {
	1024
}

/// Audit store backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
	/// "memory" or "file".
	#[serde(default = "default_storage_backend")]
	pub backend: String,
	/// Base directory for the file backend.
	#[serde(default = "default_storage_path")]
	pub path: String,
}

impl Default for StorageConfig {
	fn default() -> Self {
		Self {
			backend: default_storage_backend(),
			path: default_storage_path(),
		}
	}
}

fn default_storage_backend() -> String {
	"memory".to_string()
}

fn default_storage_path() -> String {
	"./data/audit".to_string()
}

/// Service shell settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
	#[serde(default = "default_log_level")]
	pub log_level: String,
	/// How often the settlement ticker checks whether the current window
	/// has elapsed, in seconds.
	#[serde(default = "default_tick_interval_secs")]
	pub tick_interval_secs: u64,
}

impl Default for ServiceConfig {
	fn default() -> Self {
		Self {
			log_level: default_log_level(),
			tick_interval_secs: default_tick_interval_secs(),
		}
	}
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_tick_interval_secs() -> u64 {
	1
}

/// Configuration loader with environment variable substitution
#[derive(Default)]
pub struct ConfigLoader {
	file_path: Option<String>,
	env_prefix: String,
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "SETTLE_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_string_lossy().to_string());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	pub async fn load(&self) -> Result<Config, ConfigError> {
		let mut config = if let Some(file_path) = &self.file_path {
			self.load_from_file(file_path).await?
		} else {
			Config::default()
		};

		self.apply_env_overrides(&mut config)?;
		validate(&config)?;

		Ok(config)
	}

	async fn load_from_file(&self, file_path: &str) -> Result<Config, ConfigError> {
		let content = tokio::fs::read_to_string(file_path).await.map_err(|e| {
			if e.kind() == std::io::ErrorKind::NotFound {
				ConfigError::FileNotFound(file_path.to_string())
			} else {
				ConfigError::IoError(e)
			}
		})?;

		let substituted = self.substitute_env_vars(&content)?;

		let config: Config =
			toml::from_str(&substituted).map_err(|e| ConfigError::ParseError(e.to_string()))?;

		Ok(config)
	}

	/// Replaces `${VAR_NAME}` occurrences with the environment value.
	fn substitute_env_vars(&self, content: &str) -> Result<String, ConfigError> {
		let mut result = content.to_string();

		let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("static pattern");

		for cap in re.captures_iter(content) {
			let full_match = &cap[0];
			let var_name = &cap[1];

			let env_value = env::var(var_name)
				.map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;

			result = result.replace(full_match, &env_value);
		}

		Ok(result)
	}

	fn apply_env_overrides(&self, config: &mut Config) -> Result<(), ConfigError> {
		if let Ok(log_level) = env::var(format!("{}LOG_LEVEL", self.env_prefix)) {
			config.service.log_level = log_level;
		}

		if let Ok(duration) = env::var(format!("{}BATCH_DURATION_SECS", self.env_prefix)) {
			config.engine.batch_duration_secs = duration.parse().map_err(|e| {
				ConfigError::ValidationError(format!("invalid batch duration: {}", e))
			})?;
		}

		Ok(())
	}
}

fn validate(config: &Config) -> Result<(), ConfigError> {
	if config.engine.batch_duration_secs == 0 {
		return Err(ConfigError::ValidationError(
			"batch_duration_secs must be positive".to_string(),
		));
	}

	if config.engine.max_batch_size == 0 {
		return Err(ConfigError::ValidationError(
			"max_batch_size must be positive".to_string(),
		));
	}

	match config.storage.backend.as_str() {
		"memory" | "file" => Ok(()),
		other => Err(ConfigError::ValidationError(format!(
			"unknown storage backend: {}",
			other
		))),
	}
}

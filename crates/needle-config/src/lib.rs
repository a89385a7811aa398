// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for Needle workers and processors.
//!
//! This crate provides:
//! - Layered configuration from defaults, a TOML file and the environment
//! - Consistent environment variable naming (`NEEDLE_<SECTION>_<FIELD>`)
//! - Validation of pool sizes before any engine is built
//!
//! # Usage
//!
//! ```ignore
//! use needle_config::load_config_with_file;
//!
//! let config = load_config_with_file("needle.toml")?;
//! println!("processor threads: {}", config.processor.thread_pool_size);
//! ```

pub mod defaults;
pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::NeedleConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Fully resolved configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NeedleConfig {
	pub worker: WorkerConfig,
	pub processor: ProcessorConfig,
}

impl NeedleConfig {
	/// Rejects zero-sized pools.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.worker.max_concurrency == 0 {
			return Err(ConfigError::invalid_value(
				"worker.max_concurrency",
				"must be greater than zero",
			));
		}
		if self.processor.thread_pool_size == 0 {
			return Err(ConfigError::invalid_value(
				"processor.thread_pool_size",
				"must be greater than zero",
			));
		}
		Ok(())
	}
}

/// Load configuration from defaults and environment variables.
pub fn load_config() -> Result<NeedleConfig, ConfigError> {
	load_from_sources(vec![Box::new(DefaultsSource), Box::new(EnvSource::system())])
}

/// Load configuration with a TOML file between defaults and environment.
///
/// A missing file is skipped.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<NeedleConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource::system()),
	])
}

/// Merge the given sources by precedence and validate the result.
pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<NeedleConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = NeedleConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

fn finalize(layer: NeedleConfigLayer) -> Result<NeedleConfig, ConfigError> {
	let config = NeedleConfig {
		worker: layer.worker.unwrap_or_default().finalize(),
		processor: layer.processor.unwrap_or_default().finalize(),
	};
	config.validate()?;

	info!(
		worker_max_concurrency = config.worker.max_concurrency,
		worker_on_job_failed = %config.worker.on_job_failed,
		processor_thread_pool_size = config.processor.thread_pool_size,
		processor_on_job_failed = %config.processor.on_job_failed,
		"configuration loaded"
	);
	Ok(config)
}

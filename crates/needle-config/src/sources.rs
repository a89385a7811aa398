// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: defaults, TOML files and environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use needle_core::OnJobFailed;
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::NeedleConfigLayer;
use crate::sections::{ProcessorConfigLayer, WorkerConfigLayer};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<NeedleConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<NeedleConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(NeedleConfigLayer::default())
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<NeedleConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(NeedleConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: NeedleConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Environment variable source.
///
/// Convention: NEEDLE_<SECTION>_<FIELD>
pub struct EnvSource {
	lookup: EnvLookup,
}

impl EnvSource {
	/// Reads the process environment.
	pub fn system() -> Self {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Reads variables through `lookup` instead of the process environment.
	pub fn from_lookup<F>(lookup: F) -> Self
	where
		F: Fn(&str) -> Option<String> + Send + Sync + 'static,
	{
		Self {
			lookup: Arc::new(lookup),
		}
	}

	fn var(&self, name: &str) -> Option<String> {
		(self.lookup)(name).filter(|s| !s.trim().is_empty())
	}

	fn parsed<T>(&self, name: &str) -> Result<Option<T>, ConfigError>
	where
		T: FromStr,
		T::Err: std::fmt::Display,
	{
		match self.var(name) {
			Some(v) => v.trim().parse().map(Some).map_err(|e| {
				ConfigError::Env(format!("invalid value '{v}' for {name}: {e}"))
			}),
			None => Ok(None),
		}
	}

	fn load_worker(&self) -> Result<WorkerConfigLayer, ConfigError> {
		Ok(WorkerConfigLayer {
			max_concurrency: self.parsed::<usize>("NEEDLE_WORKER_MAX_CONCURRENCY")?,
			on_job_failed: self.parsed::<OnJobFailed>("NEEDLE_WORKER_ON_JOB_FAILED")?,
		})
	}

	fn load_processor(&self) -> Result<ProcessorConfigLayer, ConfigError> {
		Ok(ProcessorConfigLayer {
			thread_pool_size: self.parsed::<usize>("NEEDLE_PROCESSOR_THREAD_POOL_SIZE")?,
			on_job_failed: self.parsed::<OnJobFailed>("NEEDLE_PROCESSOR_ON_JOB_FAILED")?,
		})
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<NeedleConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(NeedleConfigLayer {
			worker: Some(self.load_worker()?),
			processor: Some(self.load_processor()?),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use std::io::Write;

	#[test]
	fn test_precedence_order() {
		assert!(Precedence::Defaults < Precedence::ConfigFile);
		assert!(Precedence::ConfigFile < Precedence::Environment);
	}

	#[test]
	fn test_env_policy_parsing() {
		let source = EnvSource::from_lookup(|name| match name {
			"NEEDLE_WORKER_ON_JOB_FAILED" => Some("continue".to_string()),
			"NEEDLE_PROCESSOR_THREAD_POOL_SIZE" => Some(" 12 ".to_string()),
			_ => None,
		});
		let layer = source.load().unwrap();
		let worker = layer.worker.unwrap();
		assert_eq!(worker.max_concurrency, None);
		assert_eq!(
			worker.on_job_failed,
			Some(OnJobFailed::ContinueRunningPendingJobs)
		);
		assert_eq!(layer.processor.unwrap().thread_pool_size, Some(12));
	}

	#[test]
	fn test_env_rejects_garbage() {
		let source = EnvSource::from_lookup(|name| {
			(name == "NEEDLE_WORKER_MAX_CONCURRENCY").then(|| "lots".to_string())
		});
		let err = source.load().unwrap_err();
		assert!(matches!(err, ConfigError::Env(msg) if msg.contains("NEEDLE_WORKER_MAX_CONCURRENCY")));
	}

	#[test]
	fn test_empty_env_values_are_ignored() {
		let source = EnvSource::from_lookup(|_| Some("   ".to_string()));
		let layer = source.load().unwrap();
		assert_eq!(layer.worker.unwrap(), WorkerConfigLayer::default());
	}

	#[test]
	fn test_toml_parse_error_names_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[worker]\nmax_concurrency = \"four\"").unwrap();

		let err = TomlSource::new(file.path()).load().unwrap_err();
		match err {
			ConfigError::TomlParse { path, .. } => assert_eq!(path, file.path()),
			other => panic!("unexpected error: {other}"),
		}
	}

	proptest! {
		#[test]
		fn env_pool_sizes_round_trip(size in 1usize..4096) {
			let value = size.to_string();
			let source = EnvSource::from_lookup(move |name| {
				(name == "NEEDLE_PROCESSOR_THREAD_POOL_SIZE").then(|| value.clone())
			});
			let layer = source.load().unwrap();
			prop_assert_eq!(layer.processor.unwrap().thread_pool_size, Some(size));
		}
	}
}

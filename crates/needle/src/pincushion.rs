// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Config-driven factory for every worker and processor flavour.

use std::path::Path;

use needle_config::{ConfigError, NeedleConfig};
use needle_core::{NeedleError, OnJobFailed, Result};
use needle_processor::{JobProcessor, TrackedJobProcessor};
use needle_worker::{BatchWorker, PriorityWorker, TrackedBatchWorker};
use tracing::debug;

/// Builds workers and processors with sizes and policies taken from a
/// [`NeedleConfig`]. Cheap to clone; pass it to whatever needs to create
/// engines.
#[derive(Debug, Clone, Default)]
pub struct Pincushion {
	config: NeedleConfig,
}

impl Pincushion {
	pub fn from_config(config: NeedleConfig) -> std::result::Result<Self, ConfigError> {
		config.validate()?;
		Ok(Self { config })
	}

	/// Defaults overlaid with `NEEDLE_*` environment variables.
	pub fn from_env() -> std::result::Result<Self, ConfigError> {
		Self::from_config(needle_config::load_config()?)
	}

	/// Defaults, then `path` (skipped if missing), then the environment.
	pub fn load(path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
		Self::from_config(needle_config::load_config_with_file(path.as_ref())?)
	}

	pub fn config(&self) -> &NeedleConfig {
		&self.config
	}

	/// Bounded batch worker sized by `worker.max_concurrency`.
	pub fn semaphore_worker(&self) -> Result<BatchWorker> {
		self.semaphore_worker_with(
			self.config.worker.max_concurrency,
			self.config.worker.on_job_failed,
		)
	}

	pub fn semaphore_worker_with(
		&self,
		max_concurrency: usize,
		policy: OnJobFailed,
	) -> Result<BatchWorker> {
		debug!(max_concurrency, %policy, "creating semaphore worker");
		BatchWorker::bounded(max_concurrency, policy)
	}

	/// Unbounded batch worker: one task per job.
	pub fn parallel_worker(&self) -> BatchWorker {
		self.parallel_worker_with(self.config.worker.on_job_failed)
	}

	pub fn parallel_worker_with(&self, policy: OnJobFailed) -> BatchWorker {
		debug!(%policy, "creating parallel worker");
		BatchWorker::unbounded(policy)
	}

	pub fn tracked_semaphore_worker(&self) -> Result<TrackedBatchWorker> {
		self.semaphore_worker().map(TrackedBatchWorker::new)
	}

	pub fn tracked_parallel_worker(&self) -> TrackedBatchWorker {
		TrackedBatchWorker::new(self.parallel_worker())
	}

	pub fn priority_worker(&self) -> Result<PriorityWorker> {
		PriorityWorker::new(
			self.config.worker.max_concurrency,
			self.config.worker.on_job_failed,
		)
	}

	/// Processor sized by `processor.thread_pool_size`.
	pub fn job_processor(&self) -> Result<JobProcessor> {
		self.job_processor_with(
			self.config.processor.thread_pool_size,
			self.config.processor.on_job_failed,
		)
	}

	pub fn job_processor_with(
		&self,
		thread_pool_size: usize,
		policy: OnJobFailed,
	) -> Result<JobProcessor> {
		if thread_pool_size == 0 {
			return Err(NeedleError::invalid_argument(
				"thread pool size must be greater than zero",
			));
		}
		debug!(thread_pool_size, %policy, "creating job processor");
		JobProcessor::new(thread_pool_size, policy)
	}

	pub fn tracked_job_processor(&self) -> Result<TrackedJobProcessor> {
		self.job_processor().map(TrackedJobProcessor::new)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use needle_config::{ProcessorConfig, WorkerConfig};

	fn config(max_concurrency: usize, thread_pool_size: usize) -> NeedleConfig {
		NeedleConfig {
			worker: WorkerConfig {
				max_concurrency,
				on_job_failed: OnJobFailed::ContinueRunningPendingJobs,
			},
			processor: ProcessorConfig {
				thread_pool_size,
				on_job_failed: OnJobFailed::CancelPendingJobs,
			},
		}
	}

	#[test]
	fn test_factories_follow_config() {
		let pincushion = Pincushion::from_config(config(3, 5)).unwrap();

		let worker = pincushion.semaphore_worker().unwrap();
		assert_eq!(worker.max_concurrency(), Some(3));
		assert_eq!(worker.on_job_failed(), OnJobFailed::ContinueRunningPendingJobs);

		assert_eq!(pincushion.parallel_worker().max_concurrency(), None);

		let processor = pincushion.job_processor().unwrap();
		assert_eq!(processor.thread_pool_size(), 5);
		assert_eq!(processor.on_job_failed(), OnJobFailed::CancelPendingJobs);
	}

	#[test]
	fn test_invalid_config_rejected() {
		assert!(Pincushion::from_config(config(0, 1)).is_err());
		assert!(Pincushion::from_config(config(1, 0)).is_err());
	}

	#[test]
	fn test_explicit_sizes_are_validated() {
		let pincushion = Pincushion::default();
		assert!(matches!(
			pincushion.semaphore_worker_with(0, OnJobFailed::default()),
			Err(NeedleError::InvalidArgument(_))
		));
		assert!(matches!(
			pincushion.job_processor_with(0, OnJobFailed::default()),
			Err(NeedleError::InvalidArgument(_))
		));
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Batch worker configuration section.

use needle_core::OnJobFailed;
use serde::{Deserialize, Serialize};

use crate::defaults;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkerConfigLayer {
	pub max_concurrency: Option<usize>,
	pub on_job_failed: Option<OnJobFailed>,
}

impl WorkerConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.max_concurrency.is_some() {
			self.max_concurrency = other.max_concurrency;
		}
		if other.on_job_failed.is_some() {
			self.on_job_failed = other.on_job_failed;
		}
	}

	pub fn finalize(self) -> WorkerConfig {
		WorkerConfig {
			max_concurrency: self
				.max_concurrency
				.unwrap_or_else(defaults::bounded_worker_concurrency),
			on_job_failed: self.on_job_failed.unwrap_or_default(),
		}
	}
}

/// Settings for bounded batch workers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerConfig {
	pub max_concurrency: usize,
	pub on_job_failed: OnJobFailed,
}

impl Default for WorkerConfig {
	fn default() -> Self {
		WorkerConfigLayer::default().finalize()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_values() {
		let config = WorkerConfig::default();
		assert_eq!(config.max_concurrency, defaults::bounded_worker_concurrency());
		assert_eq!(config.on_job_failed, OnJobFailed::CancelPendingJobs);
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Job processor configuration section.

use needle_core::OnJobFailed;
use serde::{Deserialize, Serialize};

use crate::defaults;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProcessorConfigLayer {
	pub thread_pool_size: Option<usize>,
	pub on_job_failed: Option<OnJobFailed>,
}

impl ProcessorConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.thread_pool_size.is_some() {
			self.thread_pool_size = other.thread_pool_size;
		}
		if other.on_job_failed.is_some() {
			self.on_job_failed = other.on_job_failed;
		}
	}

	pub fn finalize(self) -> ProcessorConfig {
		ProcessorConfig {
			thread_pool_size: self
				.thread_pool_size
				.unwrap_or_else(defaults::processor_thread_pool_size),
			on_job_failed: self.on_job_failed.unwrap_or_default(),
		}
	}
}

/// Settings for job processors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessorConfig {
	pub thread_pool_size: usize,
	pub on_job_failed: OnJobFailed,
}

impl Default for ProcessorConfig {
	fn default() -> Self {
		ProcessorConfigLayer::default().finalize()
	}
}

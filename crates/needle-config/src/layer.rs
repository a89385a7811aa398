// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial configuration produced by a single source.

use serde::{Deserialize, Serialize};

use crate::sections::{ProcessorConfigLayer, WorkerConfigLayer};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NeedleConfigLayer {
	pub worker: Option<WorkerConfigLayer>,
	pub processor: Option<ProcessorConfigLayer>,
}

impl NeedleConfigLayer {
	/// Overlay `other` on top of `self`; set fields in `other` win.
	pub fn merge(&mut self, other: Self) {
		if let Some(worker) = other.worker {
			self.worker.get_or_insert_with(Default::default).merge(worker);
		}
		if let Some(processor) = other.processor {
			self.processor
				.get_or_insert_with(Default::default)
				.merge(processor);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use needle_core::OnJobFailed;

	#[test]
	fn test_merge_keeps_unset_fields() {
		let mut base = NeedleConfigLayer {
			worker: Some(WorkerConfigLayer {
				max_concurrency: Some(2),
				on_job_failed: Some(OnJobFailed::ContinueRunningPendingJobs),
			}),
			processor: None,
		};
		base.merge(NeedleConfigLayer {
			worker: Some(WorkerConfigLayer {
				max_concurrency: Some(8),
				on_job_failed: None,
			}),
			processor: Some(ProcessorConfigLayer {
				thread_pool_size: Some(4),
				on_job_failed: None,
			}),
		});

		let worker = base.worker.unwrap();
		assert_eq!(worker.max_concurrency, Some(8));
		assert_eq!(worker.on_job_failed, Some(OnJobFailed::ContinueRunningPendingJobs));
		assert_eq!(base.processor.unwrap().thread_pool_size, Some(4));
	}

	#[test]
	fn test_parse_partial_toml() {
		let layer: NeedleConfigLayer =
			toml::from_str("[processor]\non_job_failed = \"cancel_pending_jobs\"\n").unwrap();
		assert!(layer.worker.is_none());
		let processor = layer.processor.unwrap();
		assert_eq!(processor.thread_pool_size, None);
		assert_eq!(processor.on_job_failed, Some(OnJobFailed::CancelPendingJobs));
	}
}

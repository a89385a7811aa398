// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Counters and change notifications layered over a [`JobProcessor`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use needle_core::{EventHandlers, Job, JobFailure, Result, SubscriptionId};
use tokio_util::sync::CancellationToken;

use crate::processor::JobProcessor;
use crate::status::ProcessorStatus;

/// Observable properties of a [`TrackedJobProcessor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessorProperty {
	Status,
	TotalJobs,
	SuccessfullyCompletedJobs,
	FaultedJobs,
}

struct Counters {
	total: AtomicUsize,
	succeeded: AtomicUsize,
	faulted: AtomicUsize,
	property_changed: EventHandlers<ProcessorProperty>,
}

impl Counters {
	fn bump(&self, counter: &AtomicUsize, property: ProcessorProperty) {
		counter.fetch_add(1, Ordering::SeqCst);
		self.property_changed.emit(&property);
	}
}

/// A [`JobProcessor`] that counts submitted, successful and faulted jobs.
pub struct TrackedJobProcessor {
	processor: JobProcessor,
	counters: Arc<Counters>,
}

impl TrackedJobProcessor {
	pub fn new(processor: JobProcessor) -> Self {
		let counters = Arc::new(Counters {
			total: AtomicUsize::new(0),
			succeeded: AtomicUsize::new(0),
			faulted: AtomicUsize::new(0),
			property_changed: EventHandlers::new("property_changed"),
		});

		let on_fault = Arc::clone(&counters);
		processor.on_job_faulted(move |_| {
			on_fault.bump(&on_fault.faulted, ProcessorProperty::FaultedJobs);
		});

		Self {
			processor,
			counters,
		}
	}

	pub fn process_job(&self, job: Job) -> Result<()> {
		let counters = Arc::clone(&self.counters);
		let job = job.inspect(move |outcome| {
			if outcome.is_ok() {
				counters.bump(&counters.succeeded, ProcessorProperty::SuccessfullyCompletedJobs);
			}
		});

		self.processor.process_job(job)?;
		self.counters
			.bump(&self.counters.total, ProcessorProperty::TotalJobs);
		Ok(())
	}

	pub fn start(&self) -> Result<()> {
		self.processor.start()?;
		self.status_changed();
		Ok(())
	}

	pub fn pause(&self) -> Result<()> {
		self.processor.pause()?;
		self.status_changed();
		Ok(())
	}

	pub fn resume(&self) -> Result<()> {
		self.processor.resume()?;
		self.status_changed();
		Ok(())
	}

	pub fn dispose(&self) {
		let was_disposed = self.status() == ProcessorStatus::Disposed;
		self.processor.dispose();
		if !was_disposed {
			self.status_changed();
		}
	}

	pub async fn dispose_async(&self) {
		let was_disposed = self.status() == ProcessorStatus::Disposed;
		self.processor.dispose_async().await;
		if !was_disposed {
			self.status_changed();
		}
	}

	fn status_changed(&self) {
		self.counters
			.property_changed
			.emit(&ProcessorProperty::Status);
	}

	pub fn status(&self) -> ProcessorStatus {
		self.processor.status()
	}

	pub fn total_jobs(&self) -> usize {
		self.counters.total.load(Ordering::SeqCst)
	}

	pub fn successfully_completed_jobs(&self) -> usize {
		self.counters.succeeded.load(Ordering::SeqCst)
	}

	pub fn faulted_jobs(&self) -> usize {
		self.counters.faulted.load(Ordering::SeqCst)
	}

	pub fn pending_jobs(&self) -> usize {
		self.processor.pending_jobs()
	}

	pub fn cancellation_token(&self) -> CancellationToken {
		self.processor.cancellation_token()
	}

	pub fn inner(&self) -> &JobProcessor {
		&self.processor
	}

	pub fn on_property_changed<F>(&self, handler: F) -> SubscriptionId
	where
		F: Fn(&ProcessorProperty) + Send + Sync + 'static,
	{
		self.counters.property_changed.subscribe(handler)
	}

	pub fn on_job_faulted<F>(&self, handler: F) -> SubscriptionId
	where
		F: Fn(&JobFailure) + Send + Sync + 'static,
	{
		self.processor.on_job_faulted(handler)
	}

	pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
		self.counters.property_changed.unsubscribe(id) || self.processor.unsubscribe(id)
	}
}

impl std::fmt::Debug for TrackedJobProcessor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TrackedJobProcessor")
			.field("processor", &self.processor)
			.field("total_jobs", &self.total_jobs())
			.field("successfully_completed_jobs", &self.successfully_completed_jobs())
			.field("faulted_jobs", &self.faulted_jobs())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use needle_core::OnJobFailed;
	use parking_lot::Mutex;
	use std::time::Duration;

	#[tokio::test]
	async fn test_counts_outcomes() {
		let processor = TrackedJobProcessor::new(
			JobProcessor::new(2, OnJobFailed::ContinueRunningPendingJobs).unwrap(),
		);
		processor.start().unwrap();

		for i in 0..6 {
			processor
				.process_job(Job::new(move || {
					if i % 3 == 0 {
						anyhow::bail!("job {i} failed");
					}
					Ok(())
				}))
				.unwrap();
		}

		tokio::time::timeout(Duration::from_secs(5), async {
			while processor.successfully_completed_jobs() + processor.faulted_jobs() < 6 {
				tokio::time::sleep(Duration::from_millis(2)).await;
			}
		})
		.await
		.unwrap();

		assert_eq!(processor.total_jobs(), 6);
		assert_eq!(processor.successfully_completed_jobs(), 4);
		assert_eq!(processor.faulted_jobs(), 2);
		processor.dispose_async().await;
	}

	#[tokio::test]
	async fn test_status_notifications() {
		let processor =
			TrackedJobProcessor::new(JobProcessor::new(1, OnJobFailed::default()).unwrap());
		let seen = Arc::new(Mutex::new(Vec::new()));
		let sink = Arc::clone(&seen);
		processor.on_property_changed(move |property| sink.lock().push(*property));

		processor.start().unwrap();
		processor.pause().unwrap();
		assert!(processor.pause().is_err());
		processor.resume().unwrap();
		processor.dispose_async().await;
		processor.dispose();

		let statuses = seen
			.lock()
			.iter()
			.filter(|p| **p == ProcessorProperty::Status)
			.count();
		assert_eq!(statuses, 4);
		assert_eq!(processor.status(), ProcessorStatus::Disposed);
	}

	#[tokio::test]
	async fn test_rejected_job_is_not_counted() {
		let processor =
			TrackedJobProcessor::new(JobProcessor::new(1, OnJobFailed::default()).unwrap());
		processor.dispose_async().await;

		assert!(processor.process_job(Job::new(|| Ok(()))).is_err());
		assert_eq!(processor.total_jobs(), 0);
	}
}

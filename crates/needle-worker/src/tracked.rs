// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Counters and change notifications layered over a [`BatchWorker`].
//!
//! The layer only observes: jobs are wrapped with [`Job::inspect`] to count
//! outcomes, and the engine's start/complete notifications drive the
//! running flag and the end-of-run reset.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use needle_core::{EventHandlers, Job, JobFailure, JobPriority, Result, SubscriptionId};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::batch::{BatchWorker, RunReport};

/// Observable properties of a [`TrackedBatchWorker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerProperty {
	IsRunning,
	TotalJobs,
	CompletedJobs,
	SuccessfullyCompletedJobs,
	FaultedJobs,
	Progress,
}

/// `completed * 100 / total` with integer division, 0 when `total` is 0.
pub fn progress_percent(completed: usize, total: usize) -> usize {
	if total == 0 {
		0
	} else {
		completed.saturating_mul(100) / total
	}
}

struct Shared {
	running: AtomicBool,
	total: AtomicUsize,
	succeeded: AtomicUsize,
	faulted: AtomicUsize,
	// Bumped on every reset; outcomes from an older generation are ignored.
	generation: AtomicU64,
	// Held while a job is admitted and while a finished run is reset.
	admission: Mutex<()>,
	last_run: Mutex<Option<RunReport>>,
	property_changed: EventHandlers<WorkerProperty>,
}

impl Shared {
	fn notify(&self, properties: &[WorkerProperty]) {
		for property in properties {
			self.property_changed.emit(property);
		}
	}

	fn record(&self, generation: u64, outcome: &std::result::Result<(), JobFailure>) {
		if self.generation.load(Ordering::SeqCst) != generation {
			return;
		}
		let counter = if outcome.is_ok() {
			self.succeeded.fetch_add(1, Ordering::SeqCst);
			WorkerProperty::SuccessfullyCompletedJobs
		} else {
			self.faulted.fetch_add(1, Ordering::SeqCst);
			WorkerProperty::FaultedJobs
		};
		self.notify(&[
			counter,
			WorkerProperty::CompletedJobs,
			WorkerProperty::Progress,
		]);
	}

	fn finish(&self, report: &RunReport) {
		{
			let _admission = self.admission.lock();
			*self.last_run.lock() = Some(*report);
			self.generation.fetch_add(1, Ordering::SeqCst);
			self.running.store(false, Ordering::SeqCst);
			self.total.store(0, Ordering::SeqCst);
			self.succeeded.store(0, Ordering::SeqCst);
			self.faulted.store(0, Ordering::SeqCst);
		}
		self.notify(&[
			WorkerProperty::IsRunning,
			WorkerProperty::TotalJobs,
			WorkerProperty::SuccessfullyCompletedJobs,
			WorkerProperty::FaultedJobs,
			WorkerProperty::CompletedJobs,
			WorkerProperty::Progress,
		]);
	}
}

/// A [`BatchWorker`] that keeps running totals.
///
/// Counters describe the current (or upcoming) run and reset to zero when a
/// run ends; the totals of the finished run stay available through
/// [`last_run`](Self::last_run).
pub struct TrackedBatchWorker {
	worker: BatchWorker,
	shared: Arc<Shared>,
}

impl TrackedBatchWorker {
	pub fn new(worker: BatchWorker) -> Self {
		let shared = Arc::new(Shared {
			running: AtomicBool::new(false),
			total: AtomicUsize::new(0),
			succeeded: AtomicUsize::new(0),
			faulted: AtomicUsize::new(0),
			generation: AtomicU64::new(0),
			admission: Mutex::new(()),
			last_run: Mutex::new(None),
			property_changed: EventHandlers::new("property_changed"),
		});

		let on_start = Arc::clone(&shared);
		worker.on_started(move |_| {
			on_start.running.store(true, Ordering::SeqCst);
			on_start.notify(&[WorkerProperty::IsRunning]);
		});
		let on_complete = Arc::clone(&shared);
		worker.on_completed(move |report| on_complete.finish(report));

		Self { worker, shared }
	}

	pub fn add_job(&self, job: Job) -> Result<()> {
		self.add_job_with_priority(job, JobPriority::default())
	}

	pub fn add_job_with_priority(&self, job: Job, priority: JobPriority) -> Result<()> {
		{
			let _admission = self.shared.admission.lock();
			let shared = Arc::clone(&self.shared);
			let generation = self.shared.generation.load(Ordering::SeqCst);
			let job = job.inspect(move |outcome| shared.record(generation, outcome));

			self.worker.add_job_with_priority(job, priority)?;
			self.shared.total.fetch_add(1, Ordering::SeqCst);
		}
		self.shared
			.notify(&[WorkerProperty::TotalJobs, WorkerProperty::Progress]);
		Ok(())
	}

	pub async fn run(&self) -> Result<()> {
		self.worker.run().await
	}

	pub fn cancel(&self) -> Result<()> {
		self.worker.cancel()
	}

	pub fn dispose(&self) -> Result<()> {
		self.worker.dispose()
	}

	pub fn is_running(&self) -> bool {
		self.shared.running.load(Ordering::SeqCst)
	}

	pub fn total_jobs(&self) -> usize {
		self.shared.total.load(Ordering::SeqCst)
	}

	pub fn successfully_completed_jobs(&self) -> usize {
		self.shared.succeeded.load(Ordering::SeqCst)
	}

	pub fn faulted_jobs(&self) -> usize {
		self.shared.faulted.load(Ordering::SeqCst)
	}

	pub fn completed_jobs(&self) -> usize {
		self.successfully_completed_jobs() + self.faulted_jobs()
	}

	pub fn progress(&self) -> usize {
		progress_percent(self.completed_jobs(), self.total_jobs())
	}

	/// Totals of the most recent finished run.
	pub fn last_run(&self) -> Option<RunReport> {
		*self.shared.last_run.lock()
	}

	pub fn cancellation_token(&self) -> CancellationToken {
		self.worker.cancellation_token()
	}

	pub fn inner(&self) -> &BatchWorker {
		&self.worker
	}

	pub fn on_property_changed<F>(&self, handler: F) -> SubscriptionId
	where
		F: Fn(&WorkerProperty) + Send + Sync + 'static,
	{
		self.shared.property_changed.subscribe(handler)
	}

	pub fn on_job_faulted<F>(&self, handler: F) -> SubscriptionId
	where
		F: Fn(&JobFailure) + Send + Sync + 'static,
	{
		self.worker.on_job_faulted(handler)
	}

	pub fn on_canceled<F>(&self, handler: F) -> SubscriptionId
	where
		F: Fn() + Send + Sync + 'static,
	{
		self.worker.on_canceled(handler)
	}

	pub fn on_completed<F>(&self, handler: F) -> SubscriptionId
	where
		F: Fn(&RunReport) + Send + Sync + 'static,
	{
		self.worker.on_completed(handler)
	}

	pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
		self.shared.property_changed.unsubscribe(id) || self.worker.unsubscribe(id)
	}
}

impl std::fmt::Debug for TrackedBatchWorker {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TrackedBatchWorker")
			.field("worker", &self.worker)
			.field("total_jobs", &self.total_jobs())
			.field("completed_jobs", &self.completed_jobs())
			.finish()
	}
}

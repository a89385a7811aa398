// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Legacy priority-ordered batch worker.
//!
//! Every job carries a [`JobPriority`]; a run starts jobs highest priority
//! first, at most `max_concurrency` at a time. The job list is consumed by
//! the run, so jobs must be added again before the next one.

use std::sync::Arc;

use needle_core::{Job, JobFailure, JobPriority, OnJobFailed, Result, SubscriptionId};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::batch::{BatchWorker, DispatchOrder, RunReport};
use crate::tracked::{TrackedBatchWorker, WorkerProperty};

#[derive(Debug)]
pub struct PriorityWorker {
	tracked: TrackedBatchWorker,
}

impl PriorityWorker {
	pub fn new(max_concurrency: usize, policy: OnJobFailed) -> Result<Self> {
		let worker = BatchWorker::builder()
			.max_concurrency(max_concurrency)
			.on_job_failed(policy)
			.dispatch_order(DispatchOrder::Priority)
			.build()?;
		Ok(Self {
			tracked: TrackedBatchWorker::new(worker),
		})
	}

	/// Half the logical CPUs (at least one) and [`OnJobFailed::CancelPendingJobs`].
	pub fn with_defaults() -> Result<Self> {
		Self::new(
			needle_config::defaults::bounded_worker_concurrency(),
			OnJobFailed::default(),
		)
	}

	pub fn add_job(&self, job: Job, priority: JobPriority) -> Result<()> {
		self.tracked.add_job_with_priority(job, priority)
	}

	pub async fn run(&self) -> Result<()> {
		self.tracked.run().await
	}

	/// Starts a run in the background.
	pub fn begin_run(self: &Arc<Self>) -> JoinHandle<Result<()>> {
		let worker = Arc::clone(self);
		tokio::spawn(async move { worker.run().await })
	}

	/// Requests cancellation of the current run. Repeated requests are
	/// accepted; only a worker that is not running is an error.
	pub fn request_cancellation(&self) -> Result<()> {
		if !self.tracked.inner().request_cancel()? {
			debug!("cancellation already requested for this run");
		}
		Ok(())
	}

	pub fn is_running(&self) -> bool {
		self.tracked.is_running()
	}

	pub fn total_jobs(&self) -> usize {
		self.tracked.total_jobs()
	}

	pub fn completed_jobs(&self) -> usize {
		self.tracked.completed_jobs()
	}

	pub fn progress(&self) -> usize {
		self.tracked.progress()
	}

	pub fn last_run(&self) -> Option<RunReport> {
		self.tracked.last_run()
	}

	pub fn dispose(&self) -> Result<()> {
		self.tracked.dispose()
	}

	pub fn on_job_faulted<F>(&self, handler: F) -> SubscriptionId
	where
		F: Fn(&JobFailure) + Send + Sync + 'static,
	{
		self.tracked.on_job_faulted(handler)
	}

	pub fn on_canceled<F>(&self, handler: F) -> SubscriptionId
	where
		F: Fn() + Send + Sync + 'static,
	{
		self.tracked.on_canceled(handler)
	}

	pub fn on_completed<F>(&self, handler: F) -> SubscriptionId
	where
		F: Fn(&RunReport) + Send + Sync + 'static,
	{
		self.tracked.on_completed(handler)
	}

	pub fn on_property_changed<F>(&self, handler: F) -> SubscriptionId
	where
		F: Fn(&WorkerProperty) + Send + Sync + 'static,
	{
		self.tracked.on_property_changed(handler)
	}

	pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
		self.tracked.unsubscribe(id)
	}
}

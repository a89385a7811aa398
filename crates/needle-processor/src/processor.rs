// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The job processor engine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use needle_core::{EventHandlers, Job, JobFailure, NeedleError, OnJobFailed, Result, SubscriptionId};
use needle_sync::CooperativeGate;
use parking_lot::Mutex;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::queue::JobQueue;
use crate::status::ProcessorStatus;

struct Shared {
	thread_pool_size: usize,
	policy: OnJobFailed,
	status: Mutex<ProcessorStatus>,
	queue: JobQueue,
	gate: CooperativeGate,
	token: CancellationToken,
	running: AtomicUsize,
	completed: AtomicUsize,
	faulted: EventHandlers<JobFailure>,
}

impl Shared {
	/// Stops feeding the workers: closes the gate, drops queued jobs and
	/// cancels the shared token.
	fn stop(&self) {
		self.gate.close();
		let drained = self.queue.drain();
		if drained > 0 {
			debug!(drained, "discarded queued jobs on shutdown");
		}
		self.token.cancel();
	}
}

/// Queue drained by a fixed pool of persistent worker loops.
///
/// Jobs may be submitted in any state but `Disposed`. Nothing runs until
/// [`start`](Self::start); [`pause`](Self::pause) lets in-flight jobs finish
/// and holds the rest in the queue until [`resume`](Self::resume). A failing
/// job never stops its worker loop; failures are only reported through
/// [`on_job_faulted`](Self::on_job_faulted).
pub struct JobProcessor {
	shared: Arc<Shared>,
	workers: Mutex<Vec<JoinHandle<()>>>,
}

impl JobProcessor {
	pub fn new(thread_pool_size: usize, policy: OnJobFailed) -> Result<Self> {
		Self::builder()
			.thread_pool_size(thread_pool_size)
			.on_job_failed(policy)
			.build()
	}

	pub fn builder() -> JobProcessorBuilder {
		JobProcessorBuilder::default()
	}

	/// Enqueues a job. Fails only once the processor is disposed.
	pub fn process_job(&self, job: Job) -> Result<()> {
		let status = self.shared.status.lock();
		if *status == ProcessorStatus::Disposed {
			return Err(NeedleError::Disposed("JobProcessor"));
		}
		self.shared.queue.push(job);
		Ok(())
	}

	/// Opens the gate and spawns the worker loops on the current Tokio
	/// runtime. Only valid once, from `Stopped`.
	#[instrument(skip(self), fields(thread_pool_size = self.shared.thread_pool_size))]
	pub fn start(&self) -> Result<()> {
		let mut status = self.shared.status.lock();
		match *status {
			ProcessorStatus::Stopped => {}
			ProcessorStatus::Disposed => return Err(NeedleError::Disposed("JobProcessor")),
			ProcessorStatus::Running | ProcessorStatus::Paused => {
				return Err(NeedleError::invalid_state("processor has already been started"))
			}
		}

		let runtime = Handle::try_current().map_err(|_| {
			NeedleError::invalid_state("starting a processor requires a Tokio runtime")
		})?;

		*status = ProcessorStatus::Running;
		self.shared.gate.open();

		let mut workers = self.workers.lock();
		for slot in 0..self.shared.thread_pool_size {
			workers.push(runtime.spawn(worker_loop(Arc::clone(&self.shared), slot)));
		}

		info!(
			workers = workers.len(),
			pending = self.shared.queue.len(),
			"job processor started"
		);
		Ok(())
	}

	/// Closes the gate. Workers finish their current job and then wait.
	pub fn pause(&self) -> Result<()> {
		let mut status = self.shared.status.lock();
		match *status {
			ProcessorStatus::Running => {
				*status = ProcessorStatus::Paused;
				self.shared.gate.close();
				info!("job processor paused");
				Ok(())
			}
			ProcessorStatus::Disposed => Err(NeedleError::Disposed("JobProcessor")),
			ProcessorStatus::Stopped => Err(NeedleError::invalid_state("processor has not been started")),
			ProcessorStatus::Paused => Err(NeedleError::invalid_state("processor is already paused")),
		}
	}

	pub fn resume(&self) -> Result<()> {
		let mut status = self.shared.status.lock();
		match *status {
			ProcessorStatus::Paused => {
				*status = ProcessorStatus::Running;
				self.shared.gate.open();
				info!(pending = self.shared.queue.len(), "job processor resumed");
				Ok(())
			}
			ProcessorStatus::Disposed => Err(NeedleError::Disposed("JobProcessor")),
			_ => Err(NeedleError::invalid_state("processor is not paused")),
		}
	}

	/// Stops the processor and waits for every worker loop to finish.
	/// Idempotent.
	#[instrument(skip(self))]
	pub async fn dispose_async(&self) {
		let Some(handles) = self.begin_dispose() else {
			return;
		};
		wait_for_workers(handles).await;
		info!("job processor disposed");
	}

	/// Blocking variant of [`dispose_async`](Self::dispose_async).
	///
	/// Inside a multi-thread runtime the wait happens through
	/// `block_in_place`; outside any runtime it blocks the calling thread. On a
	/// current-thread runtime blocking would deadlock, so the loops are only
	/// signalled and finish in the background.
	pub fn dispose(&self) {
		let Some(handles) = self.begin_dispose() else {
			return;
		};

		match Handle::try_current() {
			Ok(runtime) => match runtime.runtime_flavor() {
				RuntimeFlavor::CurrentThread => {
					warn!(
						workers = handles.len(),
						"dispose on a current-thread runtime does not wait for workers; use dispose_async"
					);
				}
				_ => tokio::task::block_in_place(|| runtime.block_on(wait_for_workers(handles))),
			},
			Err(_) => futures::executor::block_on(wait_for_workers(handles)),
		}
		info!("job processor disposed");
	}

	fn begin_dispose(&self) -> Option<Vec<JoinHandle<()>>> {
		let handles = {
			let mut status = self.shared.status.lock();
			if *status == ProcessorStatus::Disposed {
				return None;
			}
			*status = ProcessorStatus::Disposed;
			std::mem::take(&mut *self.workers.lock())
		};
		self.shared.stop();
		Some(handles)
	}

	pub fn status(&self) -> ProcessorStatus {
		*self.shared.status.lock()
	}

	pub fn pending_jobs(&self) -> usize {
		self.shared.queue.len()
	}

	/// Jobs currently executing.
	pub fn running_jobs(&self) -> usize {
		self.shared.running.load(Ordering::SeqCst)
	}

	/// Jobs that have finished, successfully or not.
	pub fn completed_jobs(&self) -> usize {
		self.shared.completed.load(Ordering::SeqCst)
	}

	pub fn thread_pool_size(&self) -> usize {
		self.shared.thread_pool_size
	}

	pub fn on_job_failed(&self) -> OnJobFailed {
		self.shared.policy
	}

	/// Cancelled when the processor is disposed. Long-running jobs should
	/// observe it.
	pub fn cancellation_token(&self) -> CancellationToken {
		self.shared.token.clone()
	}

	pub fn on_job_faulted<F>(&self, handler: F) -> SubscriptionId
	where
		F: Fn(&JobFailure) + Send + Sync + 'static,
	{
		self.shared.faulted.subscribe(handler)
	}

	pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
		self.shared.faulted.unsubscribe(id)
	}
}

impl Drop for JobProcessor {
	fn drop(&mut self) {
		let mut status = self.shared.status.lock();
		if *status != ProcessorStatus::Disposed {
			*status = ProcessorStatus::Disposed;
			drop(status);
			self.shared.stop();
		}
	}
}

impl std::fmt::Debug for JobProcessor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("JobProcessor")
			.field("status", &self.status())
			.field("thread_pool_size", &self.shared.thread_pool_size)
			.field("policy", &self.shared.policy)
			.field("pending_jobs", &self.pending_jobs())
			.finish()
	}
}

async fn wait_for_workers(handles: Vec<JoinHandle<()>>) {
	for result in join_all(handles).await {
		if let Err(err) = result {
			warn!(error = %err, "worker loop ended abnormally");
		}
	}
}

async fn worker_loop(shared: Arc<Shared>, slot: usize) {
	debug!(slot, "worker loop started");
	loop {
		if shared.gate.wait_or_cancel(&shared.token).await.is_err() {
			break;
		}
		if shared.token.is_cancelled() {
			break;
		}

		let job = match shared.queue.try_pop() {
			Some(job) => job,
			None => {
				tokio::select! {
					biased;
					_ = shared.token.cancelled() => break,
					_ = shared.queue.wait_for_job() => {}
				}
				continue;
			}
		};

		// A pause that landed between the gate and the pop wins.
		if !shared.gate.is_open() {
			shared.queue.push_front(job);
			continue;
		}

		shared.running.fetch_add(1, Ordering::SeqCst);
		let outcome = job.run().await;
		shared.running.fetch_sub(1, Ordering::SeqCst);
		shared.completed.fetch_add(1, Ordering::SeqCst);

		if let Err(failure) = outcome {
			warn!(slot, error = %failure, "job faulted");
			shared.faulted.emit(&failure);
			if shared.policy.cancels_pending() {
				let drained = shared.queue.drain();
				if drained > 0 {
					warn!(slot, drained, "discarded pending jobs after failure");
				}
			}
		}
	}
	debug!(slot, "worker loop stopped");
}

/// Builder for [`JobProcessor`].
#[derive(Debug, Clone)]
pub struct JobProcessorBuilder {
	thread_pool_size: usize,
	policy: OnJobFailed,
}

impl Default for JobProcessorBuilder {
	fn default() -> Self {
		Self {
			thread_pool_size: needle_config::defaults::processor_thread_pool_size(),
			policy: OnJobFailed::default(),
		}
	}
}

impl JobProcessorBuilder {
	pub fn thread_pool_size(mut self, size: usize) -> Self {
		self.thread_pool_size = size;
		self
	}

	pub fn on_job_failed(mut self, policy: OnJobFailed) -> Self {
		self.policy = policy;
		self
	}

	/// Fails with `InvalidArgument` for a zero pool size.
	pub fn build(self) -> Result<JobProcessor> {
		if self.thread_pool_size == 0 {
			return Err(NeedleError::invalid_argument(
				"thread pool size must be greater than zero",
			));
		}

		Ok(JobProcessor {
			shared: Arc::new(Shared {
				thread_pool_size: self.thread_pool_size,
				policy: self.policy,
				status: Mutex::new(ProcessorStatus::Stopped),
				queue: JobQueue::default(),
				gate: CooperativeGate::new(false),
				token: CancellationToken::new(),
				running: AtomicUsize::new(0),
				completed: AtomicUsize::new(0),
				faulted: EventHandlers::new("job_faulted"),
			}),
			workers: Mutex::new(Vec::new()),
		})
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The batch worker engine.
//!
//! A run takes the registered jobs, dispatches each one as its own task
//! (after acquiring a limiter permit in bounded mode) and waits for all of
//! them. Per-run state lives in a [`RunContext`] that is replaced wholesale
//! when the run ends, so tasks that outlive an aborted run can never write
//! into the next one.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use needle_core::{
	AggregateFailure, EventHandlers, Job, JobFailure, JobPriority, NeedleError, OnJobFailed,
	Result, SubscriptionId,
};
use needle_sync::{ConcurrencyLimiter, LimiterPermit};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Start order of the jobs in a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DispatchOrder {
	#[default]
	Insertion,
	/// By [`JobPriority`], ties in insertion order.
	Priority,
}

/// Totals for one finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
	pub total: usize,
	pub succeeded: usize,
	pub faulted: usize,
	pub skipped: usize,
	pub cancelled: bool,
}

impl RunReport {
	pub fn completed(&self) -> usize {
		self.succeeded + self.faulted
	}
}

#[derive(Debug)]
enum Dispatch {
	Bounded(ConcurrencyLimiter),
	Unbounded,
}

struct QueuedJob {
	job: Job,
	priority: JobPriority,
}

struct RunContext {
	token: CancellationToken,
	canceled_raised: AtomicBool,
	failures: Mutex<Vec<JobFailure>>,
	succeeded: AtomicUsize,
	faulted: AtomicUsize,
	skipped: AtomicUsize,
}

impl RunContext {
	fn new() -> Arc<Self> {
		Arc::new(Self {
			token: CancellationToken::new(),
			canceled_raised: AtomicBool::new(false),
			failures: Mutex::new(Vec::new()),
			succeeded: AtomicUsize::new(0),
			faulted: AtomicUsize::new(0),
			skipped: AtomicUsize::new(0),
		})
	}

	fn report(&self, total: usize) -> RunReport {
		RunReport {
			total,
			succeeded: self.succeeded.load(Ordering::SeqCst),
			faulted: self.faulted.load(Ordering::SeqCst),
			skipped: self.skipped.load(Ordering::SeqCst),
			cancelled: self.token.is_cancelled(),
		}
	}
}

struct State {
	running: bool,
	disposed: bool,
	jobs: Vec<QueuedJob>,
	context: Arc<RunContext>,
}

struct Inner {
	dispatch: Dispatch,
	order: DispatchOrder,
	policy: OnJobFailed,
	state: Mutex<State>,
	started: EventHandlers<usize>,
	faulted: EventHandlers<JobFailure>,
	canceled: EventHandlers<()>,
	completed: EventHandlers<RunReport>,
}

impl Inner {
	fn raise_canceled(&self, context: &RunContext) {
		if !context.canceled_raised.swap(true, Ordering::SeqCst) {
			self.canceled.emit(&());
		}
	}

	fn record_failure(&self, context: &RunContext, failure: JobFailure) {
		if self.policy.cancels_pending() {
			if !context.token.is_cancelled() {
				debug!("cancelling pending jobs after failure");
				context.token.cancel();
			}
			self.raise_canceled(context);
		}
		warn!(error = %failure, "job faulted");
		context.faulted.fetch_add(1, Ordering::SeqCst);
		context.failures.lock().push(failure.clone());
		self.faulted.emit(&failure);
	}
}

/// Resets the worker to idle on every exit path of `run`, including a dropped
/// future.
struct RunGuard<'a> {
	inner: &'a Inner,
	context: Arc<RunContext>,
	total: usize,
	aborted: bool,
}

impl Drop for RunGuard<'_> {
	fn drop(&mut self) {
		let mut report = self.context.report(self.total);
		if self.aborted {
			self.context.token.cancel();
			// Jobs this run never saw finish, dispatched or not.
			report.skipped = report.total.saturating_sub(report.completed());
			report.cancelled = true;
		}
		info!(
			total = report.total,
			succeeded = report.succeeded,
			faulted = report.faulted,
			skipped = report.skipped,
			aborted = self.aborted,
			"batch run finished"
		);
		// Still marked running here: observers settle before new jobs are admitted.
		self.inner.completed.emit(&report);

		let mut state = self.inner.state.lock();
		state.running = false;
		state.jobs.clear();
		state.context = RunContext::new();
	}
}

/// One-shot, re-runnable batch engine.
///
/// All methods take `&self`; share the worker through an `Arc` to call
/// [`cancel`](Self::cancel) while a [`run`](Self::run) is awaited elsewhere.
pub struct BatchWorker {
	inner: Arc<Inner>,
}

impl BatchWorker {
	/// Bounded worker: at most `max_concurrency` jobs run at once.
	pub fn bounded(max_concurrency: usize, policy: OnJobFailed) -> Result<Self> {
		Self::builder()
			.max_concurrency(max_concurrency)
			.on_job_failed(policy)
			.build()
	}

	/// Unbounded worker: every job starts immediately on its own task.
	pub fn unbounded(policy: OnJobFailed) -> Self {
		Self::from_parts(Dispatch::Unbounded, DispatchOrder::Insertion, policy)
	}

	pub fn builder() -> BatchWorkerBuilder {
		BatchWorkerBuilder::default()
	}

	fn from_parts(dispatch: Dispatch, order: DispatchOrder, policy: OnJobFailed) -> Self {
		Self {
			inner: Arc::new(Inner {
				dispatch,
				order,
				policy,
				state: Mutex::new(State {
					running: false,
					disposed: false,
					jobs: Vec::new(),
					context: RunContext::new(),
				}),
				started: EventHandlers::new("started"),
				faulted: EventHandlers::new("job_faulted"),
				canceled: EventHandlers::new("canceled"),
				completed: EventHandlers::new("completed"),
			}),
		}
	}

	pub fn add_job(&self, job: Job) -> Result<()> {
		self.add_job_with_priority(job, JobPriority::default())
	}

	pub fn add_job_with_priority(&self, job: Job, priority: JobPriority) -> Result<()> {
		let mut state = self.inner.state.lock();
		if state.disposed {
			return Err(NeedleError::Disposed("BatchWorker"));
		}
		if state.running {
			return Err(NeedleError::invalid_state(
				"cannot add jobs while the worker is running",
			));
		}
		state.jobs.push(QueuedJob { job, priority });
		Ok(())
	}

	/// Requests cancellation of the current run.
	///
	/// Fails if the worker is not running or cancellation was already
	/// requested for this run, including by the failure policy.
	pub fn cancel(&self) -> Result<()> {
		if self.request_cancel()? {
			Ok(())
		} else {
			Err(NeedleError::invalid_state(
				"cancellation has already been requested",
			))
		}
	}

	/// Cancels the current run. `Ok(false)` when cancellation had already
	/// been requested for it.
	pub(crate) fn request_cancel(&self) -> Result<bool> {
		let context = {
			let state = self.inner.state.lock();
			if state.disposed {
				return Err(NeedleError::Disposed("BatchWorker"));
			}
			if !state.running {
				return Err(NeedleError::invalid_state("worker is not running"));
			}
			if state.context.token.is_cancelled() {
				return Ok(false);
			}
			state.context.token.cancel();
			Arc::clone(&state.context)
		};

		info!("batch run cancellation requested");
		self.inner.raise_canceled(&context);
		Ok(true)
	}

	/// Runs every registered job and waits for all of them.
	///
	/// Returns [`NeedleError::Aggregate`] carrying every recorded failure if
	/// any job failed. The worker is idle again when this returns.
	#[instrument(skip(self), fields(policy = %self.inner.policy))]
	pub async fn run(&self) -> Result<()> {
		let (mut jobs, context) = {
			let mut state = self.inner.state.lock();
			if state.disposed {
				return Err(NeedleError::Disposed("BatchWorker"));
			}
			if state.jobs.is_empty() {
				return Err(NeedleError::invalid_state("no jobs have been added"));
			}
			if state.running {
				return Err(NeedleError::invalid_state("worker is already running"));
			}
			state.running = true;
			(std::mem::take(&mut state.jobs), Arc::clone(&state.context))
		};

		let total = jobs.len();
		let mut guard = RunGuard {
			inner: &self.inner,
			context: Arc::clone(&context),
			total,
			aborted: true,
		};

		if self.inner.order == DispatchOrder::Priority {
			jobs.sort_by_key(|queued| queued.priority);
		}

		info!(total, "batch run started");
		self.inner.started.emit(&total);
		let mut handles = Vec::with_capacity(total);
		let mut queue = jobs.into_iter();
		while let Some(queued) = queue.next() {
			let permit = match &self.inner.dispatch {
				Dispatch::Bounded(limiter) => match limiter.acquire(&context.token).await {
					Ok(permit) => Some(permit),
					Err(_) => {
						let undispatched = 1 + queue.len();
						debug!(undispatched, "dispatch stopped by cancellation");
						context.skipped.fetch_add(undispatched, Ordering::SeqCst);
						self.inner.raise_canceled(&context);
						break;
					}
				},
				Dispatch::Unbounded => None,
			};

			handles.push(tokio::spawn(execute(
				Arc::clone(&self.inner),
				Arc::clone(&context),
				queued.job,
				permit,
			)));
		}

		for joined in join_all(handles).await {
			if let Err(err) = joined {
				let failure = JobFailure::Panicked(err.to_string());
				context.faulted.fetch_add(1, Ordering::SeqCst);
				context.failures.lock().push(failure);
			}
		}

		let failures = std::mem::take(&mut *context.failures.lock());
		guard.aborted = false;
		drop(guard);

		if failures.is_empty() {
			Ok(())
		} else {
			Err(AggregateFailure::new(failures).into())
		}
	}

	/// Releases the worker. Idempotent; fails while a run is in progress.
	pub fn dispose(&self) -> Result<()> {
		let mut state = self.inner.state.lock();
		if state.disposed {
			return Ok(());
		}
		if state.running {
			return Err(NeedleError::invalid_state(
				"cannot dispose while the worker is running",
			));
		}
		state.disposed = true;
		state.jobs.clear();
		state.context.token.cancel();
		if let Dispatch::Bounded(limiter) = &self.inner.dispatch {
			limiter.close();
		}
		debug!("batch worker disposed");
		Ok(())
	}

	pub fn is_running(&self) -> bool {
		self.inner.state.lock().running
	}

	pub fn is_disposed(&self) -> bool {
		self.inner.state.lock().disposed
	}

	/// Jobs registered for the next run.
	pub fn pending_jobs(&self) -> usize {
		self.inner.state.lock().jobs.len()
	}

	/// The token observed by the current run, or by the next one when idle.
	pub fn cancellation_token(&self) -> CancellationToken {
		self.inner.state.lock().context.token.clone()
	}

	pub fn on_job_failed(&self) -> OnJobFailed {
		self.inner.policy
	}

	/// Permit count in bounded mode, `None` when unbounded.
	pub fn max_concurrency(&self) -> Option<usize> {
		match &self.inner.dispatch {
			Dispatch::Bounded(limiter) => Some(limiter.max_permits()),
			Dispatch::Unbounded => None,
		}
	}

	pub fn dispatch_order(&self) -> DispatchOrder {
		self.inner.order
	}

	/// Raised when a run begins, with the number of jobs in it.
	pub fn on_started<F>(&self, handler: F) -> SubscriptionId
	where
		F: Fn(usize) + Send + Sync + 'static,
	{
		self.inner.started.subscribe(move |total| handler(*total))
	}

	pub fn on_job_faulted<F>(&self, handler: F) -> SubscriptionId
	where
		F: Fn(&JobFailure) + Send + Sync + 'static,
	{
		self.inner.faulted.subscribe(handler)
	}

	/// Raised at most once per run when cancellation is observed.
	pub fn on_canceled<F>(&self, handler: F) -> SubscriptionId
	where
		F: Fn() + Send + Sync + 'static,
	{
		self.inner.canceled.subscribe(move |_| handler())
	}

	/// Raised once at the end of every run, before the worker accepts jobs
	/// for the next one.
	pub fn on_completed<F>(&self, handler: F) -> SubscriptionId
	where
		F: Fn(&RunReport) + Send + Sync + 'static,
	{
		self.inner.completed.subscribe(handler)
	}

	pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
		self.inner.started.unsubscribe(id)
			|| self.inner.faulted.unsubscribe(id)
			|| self.inner.canceled.unsubscribe(id)
			|| self.inner.completed.unsubscribe(id)
	}
}

impl std::fmt::Debug for BatchWorker {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.inner.state.lock();
		f.debug_struct("BatchWorker")
			.field("dispatch", &self.inner.dispatch)
			.field("order", &self.inner.order)
			.field("policy", &self.inner.policy)
			.field("running", &state.running)
			.field("pending_jobs", &state.jobs.len())
			.finish()
	}
}

async fn execute(
	inner: Arc<Inner>,
	context: Arc<RunContext>,
	job: Job,
	permit: Option<LimiterPermit>,
) {
	let _permit = permit;

	if context.token.is_cancelled() {
		debug!("job skipped after cancellation");
		context.skipped.fetch_add(1, Ordering::SeqCst);
		inner.raise_canceled(&context);
		return;
	}

	match job.run().await {
		Ok(()) => {
			context.succeeded.fetch_add(1, Ordering::SeqCst);
		}
		Err(failure) => inner.record_failure(&context, failure),
	}
}

#[derive(Debug, Clone, Copy)]
enum Concurrency {
	Bounded(usize),
	Unbounded,
}

/// Builder for [`BatchWorker`].
#[derive(Debug, Clone)]
pub struct BatchWorkerBuilder {
	concurrency: Concurrency,
	policy: OnJobFailed,
	order: DispatchOrder,
}

impl Default for BatchWorkerBuilder {
	fn default() -> Self {
		Self {
			concurrency: Concurrency::Bounded(needle_config::defaults::bounded_worker_concurrency()),
			policy: OnJobFailed::default(),
			order: DispatchOrder::default(),
		}
	}
}

impl BatchWorkerBuilder {
	pub fn max_concurrency(mut self, permits: usize) -> Self {
		self.concurrency = Concurrency::Bounded(permits);
		self
	}

	pub fn unbounded(mut self) -> Self {
		self.concurrency = Concurrency::Unbounded;
		self
	}

	pub fn on_job_failed(mut self, policy: OnJobFailed) -> Self {
		self.policy = policy;
		self
	}

	pub fn dispatch_order(mut self, order: DispatchOrder) -> Self {
		self.order = order;
		self
	}

	/// Fails with `InvalidArgument` for a zero permit count.
	pub fn build(self) -> Result<BatchWorker> {
		let dispatch = match self.concurrency {
			Concurrency::Bounded(permits) => Dispatch::Bounded(ConcurrencyLimiter::new(permits)?),
			Concurrency::Unbounded => Dispatch::Unbounded,
		};
		Ok(BatchWorker::from_parts(dispatch, self.order, self.policy))
	}
}

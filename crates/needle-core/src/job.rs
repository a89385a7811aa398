// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The normalized unit of work accepted by every engine.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};

use crate::error::JobFailure;

type JobBody = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// A caller-supplied unit of work.
///
/// Synchronous closures and closures returning a future are both normalized
/// to a future that completes when the body returns. A synchronous body runs
/// on the first poll of that future, so both shapes go through the same
/// fault and cancellation bookkeeping.
pub struct Job {
	body: JobBody,
}

impl Job {
	/// Wraps a synchronous action.
	pub fn new<F>(f: F) -> Self
	where
		F: FnOnce() -> anyhow::Result<()> + Send + 'static,
	{
		Self {
			body: Box::new(move || async move { f() }.boxed()),
		}
	}

	/// Wraps an asynchronous operation.
	pub fn new_async<F, Fut>(f: F) -> Self
	where
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
	{
		Self {
			body: Box::new(move || f().boxed()),
		}
	}

	/// Attaches an observer that sees the outcome after the body finishes.
	///
	/// The observer runs on the same task as the job and does not change the
	/// outcome.
	pub fn inspect<F>(self, observer: F) -> Self
	where
		F: FnOnce(&Result<(), JobFailure>) + Send + 'static,
	{
		Self::from_outcome(move || async move {
			let outcome = self.run().await;
			observer(&outcome);
			outcome
		})
	}

	fn from_outcome<F, Fut>(f: F) -> Self
	where
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = Result<(), JobFailure>> + Send + 'static,
	{
		Self::new_async(move || async move { f().await.map_err(OutcomeCarrier::carry) })
	}

	/// Runs the job, containing panics and classifying its failure.
	pub async fn run(self) -> Result<(), JobFailure> {
		let body = self.body;
		match AssertUnwindSafe(async move { body().await })
			.catch_unwind()
			.await
		{
			Ok(Ok(())) => Ok(()),
			Ok(Err(err)) => Err(OutcomeCarrier::into_failure(err)),
			Err(payload) => Err(JobFailure::panicked(payload.as_ref())),
		}
	}
}

impl fmt::Debug for Job {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Job").finish_non_exhaustive()
	}
}

/// Carries an already-classified failure through an `anyhow::Error` so that
/// inspected jobs keep their original classification.
#[derive(Debug)]
struct OutcomeCarrier(JobFailure);

impl fmt::Display for OutcomeCarrier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&self.0, f)
	}
}

impl std::error::Error for OutcomeCarrier {}

impl OutcomeCarrier {
	fn carry(failure: JobFailure) -> anyhow::Error {
		anyhow::Error::new(Self(failure))
	}

	fn into_failure(err: anyhow::Error) -> JobFailure {
		match err.downcast::<Self>() {
			Ok(carrier) => carrier.0,
			Err(err) => JobFailure::error(err),
		}
	}
}

/// Start-order priority used by the legacy priority worker.
///
/// Lower discriminants start first; ties keep insertion order.
#[derive(
	Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
	Highest = 1,
	High = 2,
	#[default]
	Medium = 3,
	Low = 4,
	Lowest = 5,
}

impl fmt::Display for JobPriority {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Highest => "highest",
			Self::High => "high",
			Self::Medium => "medium",
			Self::Low => "low",
			Self::Lowest => "lowest",
		};
		f.write_str(name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::JobCancelled;
	use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
	use std::sync::Arc;

	#[tokio::test]
	async fn test_sync_job_runs_on_first_poll() {
		let ran = Arc::new(AtomicBool::new(false));
		let flag = Arc::clone(&ran);
		let job = Job::new(move || {
			flag.store(true, Ordering::SeqCst);
			Ok(())
		});

		assert!(!ran.load(Ordering::SeqCst));
		assert!(job.run().await.is_ok());
		assert!(ran.load(Ordering::SeqCst));
	}

	#[tokio::test]
	async fn test_async_job_error_is_classified() {
		let job = Job::new_async(|| async { Err(anyhow::anyhow!("disk full")) });
		match job.run().await {
			Err(JobFailure::Error(err)) => assert_eq!(err.to_string(), "disk full"),
			other => panic!("unexpected outcome: {other:?}"),
		}
	}

	#[tokio::test]
	async fn test_cancelled_job_is_classified() {
		let job = Job::new_async(|| async { Err(anyhow::Error::new(JobCancelled)) });
		assert!(matches!(job.run().await, Err(JobFailure::Cancelled)));
	}

	#[tokio::test]
	async fn test_panics_are_contained() {
		let job = Job::new(|| panic!("kaboom"));
		match job.run().await {
			Err(JobFailure::Panicked(msg)) => assert_eq!(msg, "kaboom"),
			other => panic!("unexpected outcome: {other:?}"),
		}

		let job = Job::new_async(|| async {
			if true {
				panic!("async kaboom");
			}
			Ok(())
		});
		assert!(matches!(job.run().await, Err(JobFailure::Panicked(_))));
	}

	#[tokio::test]
	async fn test_inspect_preserves_classification() {
		let seen = Arc::new(AtomicUsize::new(0));

		let counter = Arc::clone(&seen);
		let job = Job::new(|| panic!("inner")).inspect(move |outcome| {
			assert!(matches!(outcome, Err(JobFailure::Panicked(_))));
			counter.fetch_add(1, Ordering::SeqCst);
		});
		assert!(matches!(job.run().await, Err(JobFailure::Panicked(_))));

		let counter = Arc::clone(&seen);
		let job = Job::new(|| Ok(())).inspect(move |outcome| {
			assert!(outcome.is_ok());
			counter.fetch_add(1, Ordering::SeqCst);
		});
		assert!(job.run().await.is_ok());

		let counter = Arc::clone(&seen);
		let job = Job::new(|| Err(anyhow::Error::new(JobCancelled))).inspect(move |outcome| {
			assert!(matches!(outcome, Err(JobFailure::Cancelled)));
			counter.fetch_add(1, Ordering::SeqCst);
		});
		assert!(matches!(job.run().await, Err(JobFailure::Cancelled)));

		assert_eq!(seen.load(Ordering::SeqCst), 3);
	}

	#[test]
	fn test_priority_ordering() {
		let mut priorities = vec![
			JobPriority::Low,
			JobPriority::Highest,
			JobPriority::Medium,
			JobPriority::Lowest,
			JobPriority::High,
		];
		priorities.sort();
		assert_eq!(
			priorities,
			vec![
				JobPriority::Highest,
				JobPriority::High,
				JobPriority::Medium,
				JobPriority::Low,
				JobPriority::Lowest,
			]
		);
		assert_eq!(JobPriority::default(), JobPriority::Medium);
	}

	#[test]
	fn test_priority_serde() {
		let json = serde_json::to_string(&JobPriority::Highest).unwrap();
		assert_eq!(json, "\"highest\"");
		let parsed: JobPriority = serde_json::from_str("\"low\"").unwrap();
		assert_eq!(parsed, JobPriority::Low);
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Counting permit pool bounding how many jobs run at once.

use std::sync::Arc;

use needle_core::{NeedleError, Result};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio_util::sync::CancellationToken;

/// A fixed pool of `N >= 1` permits. Clones share the same pool.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
	semaphore: Arc<Semaphore>,
	max_permits: usize,
}

/// A held permit. Dropping it returns the permit and wakes at most one waiter.
#[derive(Debug)]
#[must_use = "dropping the permit releases it immediately"]
pub struct LimiterPermit {
	_permit: OwnedSemaphorePermit,
}

impl LimiterPermit {
	pub fn release(self) {}
}

impl ConcurrencyLimiter {
	pub fn new(permits: usize) -> Result<Self> {
		if permits == 0 {
			return Err(NeedleError::invalid_argument(
				"permit count must be greater than zero",
			));
		}
		if permits > Semaphore::MAX_PERMITS {
			return Err(NeedleError::invalid_argument(format!(
				"permit count must not exceed {}",
				Semaphore::MAX_PERMITS
			)));
		}

		Ok(Self {
			semaphore: Arc::new(Semaphore::new(permits)),
			max_permits: permits,
		})
	}

	/// Waits for a permit or for `cancel` to fire.
	pub async fn acquire(&self, cancel: &CancellationToken) -> Result<LimiterPermit> {
		if cancel.is_cancelled() {
			return Err(NeedleError::Cancelled);
		}

		tokio::select! {
			biased;
			_ = cancel.cancelled() => Err(NeedleError::Cancelled),
			permit = Arc::clone(&self.semaphore).acquire_owned() => permit
				.map(|permit| LimiterPermit { _permit: permit })
				.map_err(|_| NeedleError::invalid_state("limiter has been closed")),
		}
	}

	pub fn try_acquire(&self) -> Option<LimiterPermit> {
		match Arc::clone(&self.semaphore).try_acquire_owned() {
			Ok(permit) => Some(LimiterPermit { _permit: permit }),
			Err(TryAcquireError::NoPermits) | Err(TryAcquireError::Closed) => None,
		}
	}

	pub fn available_permits(&self) -> usize {
		self.semaphore.available_permits()
	}

	pub fn max_permits(&self) -> usize {
		self.max_permits
	}

	/// Fails every pending and future `acquire` with `InvalidState`.
	pub fn close(&self) {
		self.semaphore.close();
	}

	pub fn is_closed(&self) -> bool {
		self.semaphore.is_closed()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;
	use tokio_test::{assert_pending, assert_ready_err, assert_ready_ok, task};

	#[test]
	fn test_zero_permits_rejected() {
		let err = ConcurrencyLimiter::new(0).unwrap_err();
		assert!(matches!(err, NeedleError::InvalidArgument(_)));
	}

	#[test]
	fn test_release_wakes_waiter() {
		let limiter = ConcurrencyLimiter::new(1).unwrap();
		let token = CancellationToken::new();

		let held = limiter.try_acquire().expect("first permit");
		assert_eq!(limiter.available_permits(), 0);
		assert!(limiter.try_acquire().is_none());

		let mut waiter = task::spawn(limiter.acquire(&token));
		assert_pending!(waiter.poll());

		held.release();
		assert!(waiter.is_woken());
		let _permit = assert_ready_ok!(waiter.poll());
		assert_eq!(limiter.available_permits(), 0);
	}

	#[test]
	fn test_cancel_while_waiting_for_permit() {
		let limiter = ConcurrencyLimiter::new(1).unwrap();
		let token = CancellationToken::new();
		let _held = limiter.try_acquire().expect("first permit");

		let mut waiter = task::spawn(limiter.acquire(&token));
		assert_pending!(waiter.poll());

		token.cancel();
		let err = assert_ready_err!(waiter.poll());
		assert!(err.is_cancelled());
	}

	#[test]
	fn test_close_fails_waiters() {
		let limiter = ConcurrencyLimiter::new(1).unwrap();
		let token = CancellationToken::new();
		let _held = limiter.try_acquire().expect("first permit");

		let mut waiter = task::spawn(limiter.acquire(&token));
		assert_pending!(waiter.poll());

		limiter.close();
		let err = assert_ready_err!(waiter.poll());
		assert!(matches!(err, NeedleError::InvalidState(_)));
		assert!(limiter.is_closed());
	}

	#[test]
	fn test_clones_share_the_pool() {
		let limiter = ConcurrencyLimiter::new(2).unwrap();
		let other = limiter.clone();
		let _a = limiter.try_acquire().unwrap();
		let _b = other.try_acquire().unwrap();
		assert!(limiter.try_acquire().is_none());
		assert_eq!(other.max_permits(), 2);
	}

	proptest! {
		#![proptest_config(ProptestConfig::with_cases(24))]

		#[test]
		fn concurrency_never_exceeds_permits(permits in 1usize..6, jobs in 1usize..24) {
			let runtime = tokio::runtime::Builder::new_multi_thread()
				.worker_threads(4)
				.enable_time()
				.build()
				.unwrap();

			let watermark = runtime.block_on(async move {
				let limiter = ConcurrencyLimiter::new(permits).unwrap();
				let token = CancellationToken::new();
				let active = Arc::new(AtomicUsize::new(0));
				let watermark = Arc::new(AtomicUsize::new(0));

				let mut handles = Vec::new();
				for _ in 0..jobs {
					let limiter = limiter.clone();
					let token = token.clone();
					let active = Arc::clone(&active);
					let watermark = Arc::clone(&watermark);
					handles.push(tokio::spawn(async move {
						let _permit = limiter.acquire(&token).await.unwrap();
						let now = active.fetch_add(1, Ordering::SeqCst) + 1;
						watermark.fetch_max(now, Ordering::SeqCst);
						tokio::time::sleep(Duration::from_millis(1)).await;
						active.fetch_sub(1, Ordering::SeqCst);
					}));
				}
				for handle in handles {
					handle.await.unwrap();
				}
				assert_eq!(limiter.available_permits(), permits);
				watermark.load(Ordering::SeqCst)
			});

			prop_assert!(watermark <= permits);
			prop_assert!(watermark >= 1);
		}
	}
}

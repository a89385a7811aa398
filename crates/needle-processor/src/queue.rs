// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Unbounded FIFO job queue shared by the worker loops.

use std::collections::VecDeque;

use needle_core::Job;
use parking_lot::Mutex;
use tokio::sync::Notify;

#[derive(Default)]
pub(crate) struct JobQueue {
	items: Mutex<VecDeque<Job>>,
	available: Notify,
}

impl JobQueue {
	pub(crate) fn push(&self, job: Job) {
		self.items.lock().push_back(job);
		self.available.notify_one();
	}

	/// Returns a job taken by a worker that must not run it yet.
	pub(crate) fn push_front(&self, job: Job) {
		self.items.lock().push_front(job);
		self.available.notify_one();
	}

	pub(crate) fn try_pop(&self) -> Option<Job> {
		self.items.lock().pop_front()
	}

	/// Discards every queued job and returns how many were dropped.
	pub(crate) fn drain(&self) -> usize {
		let drained = std::mem::take(&mut *self.items.lock());
		drained.len()
	}

	pub(crate) fn len(&self) -> usize {
		self.items.lock().len()
	}

	/// Resolves once the queue may hold a job. Callers re-check with
	/// [`try_pop`](Self::try_pop).
	pub(crate) async fn wait_for_job(&self) {
		let notified = self.available.notified();
		tokio::pin!(notified);
		notified.as_mut().enable();
		if !self.items.lock().is_empty() {
			return;
		}
		notified.await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;
	use std::time::Duration;

	fn tagged(order: &Arc<parking_lot::Mutex<Vec<usize>>>, tag: usize) -> Job {
		let order = Arc::clone(order);
		Job::new(move || {
			order.lock().push(tag);
			Ok(())
		})
	}

	#[tokio::test]
	async fn test_fifo_with_push_front() {
		let queue = JobQueue::default();
		let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
		queue.push(tagged(&order, 1));
		queue.push(tagged(&order, 2));

		let first = queue.try_pop().unwrap();
		queue.push_front(first);
		assert_eq!(queue.len(), 2);

		while let Some(job) = queue.try_pop() {
			job.run().await.unwrap();
		}
		assert_eq!(*order.lock(), vec![1, 2]);
	}

	#[tokio::test]
	async fn test_wait_for_job_wakes_on_push() {
		let queue = Arc::new(JobQueue::default());
		let woke = Arc::new(AtomicUsize::new(0));

		let waiter = {
			let queue = Arc::clone(&queue);
			let woke = Arc::clone(&woke);
			tokio::spawn(async move {
				queue.wait_for_job().await;
				woke.fetch_add(1, Ordering::SeqCst);
			})
		};

		tokio::task::yield_now().await;
		queue.push(Job::new(|| Ok(())));
		tokio::time::timeout(Duration::from_secs(5), waiter)
			.await
			.unwrap()
			.unwrap();
		assert_eq!(woke.load(Ordering::SeqCst), 1);
		assert_eq!(queue.drain(), 1);
		assert_eq!(queue.len(), 0);
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use needle::{Job, JobPriority, OnJobFailed, Pincushion, ProcessorStatus};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pincushion_from_file_drives_every_engine() {
	let mut file = tempfile::NamedTempFile::new().unwrap();
	writeln!(
		file,
		"[worker]\nmax_concurrency = 2\non_job_failed = \"continue_running_pending_jobs\"\n\n[processor]\nthread_pool_size = 3"
	)
	.unwrap();
	let pincushion = Pincushion::load(file.path()).unwrap();
	let counter = Arc::new(AtomicUsize::new(0));

	let worker = pincushion.tracked_semaphore_worker().unwrap();
	for i in 0..9 {
		let counter = Arc::clone(&counter);
		worker
			.add_job(Job::new(move || {
				if i % 4 == 3 {
					anyhow::bail!("job {i} failed");
				}
				counter.fetch_add(1, Ordering::SeqCst);
				Ok(())
			}))
			.unwrap();
	}
	let err = worker.run().await.unwrap_err();
	assert_eq!(err.as_aggregate().map(|a| a.len()), Some(2));
	assert_eq!(counter.load(Ordering::SeqCst), 7);

	let priority = pincushion.priority_worker().unwrap();
	priority
		.add_job(Job::new(|| Ok(())), JobPriority::Highest)
		.unwrap();
	priority.run().await.unwrap();

	let processor = pincushion.tracked_job_processor().unwrap();
	assert_eq!(processor.inner().thread_pool_size(), 3);
	processor.start().unwrap();
	for _ in 0..10 {
		let counter = Arc::clone(&counter);
		processor
			.process_job(Job::new_async(move || async move {
				counter.fetch_add(1, Ordering::SeqCst);
				Ok(())
			}))
			.unwrap();
	}
	tokio::time::timeout(Duration::from_secs(5), async {
		while processor.successfully_completed_jobs() < 10 {
			tokio::time::sleep(Duration::from_millis(2)).await;
		}
	})
	.await
	.unwrap();
	processor.dispose_async().await;

	assert_eq!(counter.load(Ordering::SeqCst), 17);
	assert_eq!(processor.status(), ProcessorStatus::Disposed);
}

#[tokio::test]
async fn test_parallel_worker_is_reusable() {
	let pincushion = Pincushion::default();
	let worker = pincushion.parallel_worker_with(OnJobFailed::CancelPendingJobs);

	for round in 1..=3 {
		for _ in 0..round {
			worker.add_job(Job::new(|| Ok(()))).unwrap();
		}
		worker.run().await.unwrap();
		assert!(!worker.is_running());
	}
}

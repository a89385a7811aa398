// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! One timed run of a workload through each execution model.

use std::time::{Duration, Instant};

use anyhow::Context;
use needle::{Job, Pincushion};
use tokio::sync::mpsc;

use crate::args::Model;

fn sleeping_job(delay: Duration) -> Job {
	Job::new_async(move || async move {
		tokio::time::sleep(delay).await;
		Ok(())
	})
}

/// Runs `jobs` sleeping jobs through `model` and returns the elapsed time.
pub async fn measure(
	pincushion: &Pincushion,
	model: Model,
	jobs: usize,
	delay: Duration,
) -> anyhow::Result<Duration> {
	let started = Instant::now();
	match model {
		Model::Sequential => {
			for _ in 0..jobs {
				tokio::time::sleep(delay).await;
			}
		}
		Model::Semaphore => {
			let worker = pincushion.semaphore_worker()?;
			for _ in 0..jobs {
				worker.add_job(sleeping_job(delay))?;
			}
			worker.run().await?;
		}
		Model::Parallel => {
			let worker = pincushion.parallel_worker();
			for _ in 0..jobs {
				worker.add_job(sleeping_job(delay))?;
			}
			worker.run().await?;
		}
		Model::Processor => {
			let processor = pincushion.job_processor()?;
			let (done_tx, mut done_rx) = mpsc::unbounded_channel();
			processor.start()?;
			for _ in 0..jobs {
				let done = done_tx.clone();
				processor.process_job(Job::new_async(move || async move {
					tokio::time::sleep(delay).await;
					let _ = done.send(());
					Ok(())
				}))?;
			}
			for _ in 0..jobs {
				done_rx
					.recv()
					.await
					.context("processor stopped before every job finished")?;
			}
			processor.dispose_async().await;
		}
	}
	Ok(started.elapsed())
}

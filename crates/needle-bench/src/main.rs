// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod args;
mod scenarios;

use std::time::Duration;

use clap::Parser;
use needle::Pincushion;
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use args::{Args, Model};

#[derive(Debug, Serialize)]
struct Measurement {
	model: Model,
	jobs: usize,
	iterations: u32,
	mean_ms: f64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
		.init();

	let args = Args::parse();
	anyhow::ensure!(args.iterations > 0, "--iterations must be at least 1");

	let pincushion = match &args.config {
		Some(path) => Pincushion::load(path)?,
		None => Pincushion::from_env()?,
	};
	info!(
		max_concurrency = pincushion.config().worker.max_concurrency,
		thread_pool_size = pincushion.config().processor.thread_pool_size,
		"benchmark configured"
	);

	if !args.json {
		println!("{:<12} {:>8} {:>12}", "model", "jobs", "mean (ms)");
	}

	for &jobs in &args.jobs {
		for &model in &args.models {
			let mut total = Duration::ZERO;
			for iteration in 0..args.iterations {
				let elapsed =
					scenarios::measure(&pincushion, model, jobs, args.job_delay()).await?;
				debug!(?model, jobs, iteration, elapsed_ms = elapsed.as_secs_f64() * 1000.0, "iteration finished");
				total += elapsed;
			}

			let measurement = Measurement {
				model,
				jobs,
				iterations: args.iterations,
				mean_ms: total.as_secs_f64() * 1000.0 / f64::from(args.iterations),
			};
			if args.json {
				println!("{}", serde_json::to_string(&measurement)?);
			} else {
				println!(
					"{:<12} {:>8} {:>12.3}",
					format!("{:?}", measurement.model).to_lowercase(),
					measurement.jobs,
					measurement.mean_ms
				);
			}
		}
	}

	Ok(())
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

/// Needle benchmark - compare execution models on a sleep workload
#[derive(Parser, Debug)]
#[command(name = "needle-bench")]
pub struct Args {
	/// Job counts to measure
	#[arg(long, value_delimiter = ',', default_value = "10,50,100")]
	pub jobs: Vec<usize>,

	/// Time each job sleeps, in milliseconds
	#[arg(long, default_value_t = 1)]
	pub job_delay_ms: u64,

	/// Runs per model and job count; the mean is reported
	#[arg(long, default_value_t = 3)]
	pub iterations: u32,

	/// Models to measure
	#[arg(long, value_enum, value_delimiter = ',', default_value = "sequential,semaphore,parallel,processor")]
	pub models: Vec<Model>,

	/// Needle config file (or set NEEDLE_CONFIG)
	#[arg(long, env = "NEEDLE_CONFIG")]
	pub config: Option<PathBuf>,

	/// Emit results as JSON lines instead of a table
	#[arg(long)]
	pub json: bool,
}

impl Args {
	pub fn job_delay(&self) -> Duration {
		Duration::from_millis(self.job_delay_ms)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Model {
	/// One job after another on the calling task
	Sequential,
	/// Bounded batch worker
	Semaphore,
	/// Unbounded batch worker
	Parallel,
	/// Job processor
	Processor,
}

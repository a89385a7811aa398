// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Needle: run caller-supplied jobs concurrently.
//!
//! Two execution models are offered:
//! - one-shot batch workers ([`BatchWorker`], [`TrackedBatchWorker`],
//!   [`PriorityWorker`]) that run a finite job set and aggregate failures
//! - long-running processors ([`JobProcessor`], [`TrackedJobProcessor`]) that
//!   drain a queue through a fixed worker pool with pause/resume
//!
//! [`Pincushion`] builds any of them from a [`NeedleConfig`].
//!
//! # Usage
//!
//! ```ignore
//! use needle::{Job, Pincushion};
//!
//! let pincushion = Pincushion::default();
//! let worker = pincushion.semaphore_worker()?;
//! worker.add_job(Job::new(|| Ok(())))?;
//! worker.run().await?;
//! ```

mod pincushion;

pub use pincushion::Pincushion;

pub use needle_config::{ConfigError, NeedleConfig, ProcessorConfig, WorkerConfig};
pub use needle_core::{
	AggregateFailure, Job, JobCancelled, JobFailure, JobPriority, NeedleError, OnJobFailed, Result,
	SubscriptionId,
};
pub use needle_processor::{
	JobProcessor, JobProcessorBuilder, ProcessorProperty, ProcessorStatus, TrackedJobProcessor,
};
pub use needle_sync::{CancellationToken, ConcurrencyLimiter, CooperativeGate, LimiterPermit};
pub use needle_worker::{
	BatchWorker, BatchWorkerBuilder, DispatchOrder, PriorityWorker, RunReport, TrackedBatchWorker,
	WorkerProperty,
};

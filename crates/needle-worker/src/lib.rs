// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! One-shot, re-runnable batch workers.
//!
//! - [`BatchWorker`] runs a registered job set under a bounded (semaphore) or
//!   unbounded (one task per job) policy and aggregates failures.
//! - [`TrackedBatchWorker`] adds running counters and change notifications.
//! - [`PriorityWorker`] is the legacy priority-ordered bounded variant.

pub mod batch;
pub mod priority;
pub mod tracked;

pub use batch::{BatchWorker, BatchWorkerBuilder, DispatchOrder, RunReport};
pub use priority::PriorityWorker;
pub use tracked::{TrackedBatchWorker, WorkerProperty};

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Long-running job processing.
//!
//! [`JobProcessor`] drains an unbounded FIFO queue through a fixed pool of
//! worker loops that pause and resume cooperatively at a shared gate.
//! [`TrackedJobProcessor`] layers counters and change notifications on top.

mod queue;

pub mod processor;
pub mod status;
pub mod tracked;

pub use processor::{JobProcessor, JobProcessorBuilder};
pub use status::ProcessorStatus;
pub use tracked::{ProcessorProperty, TrackedJobProcessor};

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod processor;
mod worker;

pub use processor::{ProcessorConfig, ProcessorConfigLayer};
pub use worker::{WorkerConfig, WorkerConfigLayer};

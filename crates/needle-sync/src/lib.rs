// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Suspension primitives used by the Needle engines.
//!
//! Neither primitive parks an OS thread: waiting on a [`CooperativeGate`] or a
//! [`ConcurrencyLimiter`] suspends the calling task only.

pub mod gate;
pub mod limiter;

pub use gate::CooperativeGate;
pub use limiter::{ConcurrencyLimiter, LimiterPermit};
pub use tokio_util::sync::CancellationToken;

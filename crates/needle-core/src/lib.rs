// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types shared by the Needle engines.
//!
//! This crate provides:
//! - [`Job`], the normalized unit of work accepted by every engine
//! - The error taxonomy ([`NeedleError`], [`JobFailure`], [`AggregateFailure`])
//! - The failure policy ([`OnJobFailed`]) and legacy [`JobPriority`]
//! - [`EventHandlers`], an isolated callback registry used for notifications

pub mod error;
pub mod handlers;
pub mod job;
pub mod policy;

pub use error::{AggregateFailure, JobCancelled, JobFailure, NeedleError, Result};
pub use handlers::{EventHandlers, SubscriptionId};
pub use job::{Job, JobPriority};
pub use policy::OnJobFailed;

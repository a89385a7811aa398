// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the Needle engines.

use std::fmt;
use std::sync::Arc;

/// Errors returned by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum NeedleError {
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),

	#[error("Invalid state: {0}")]
	InvalidState(String),

	#[error("{0} has been disposed")]
	Disposed(&'static str),

	#[error("Operation was cancelled")]
	Cancelled,

	#[error(transparent)]
	Aggregate(#[from] AggregateFailure),
}

impl NeedleError {
	pub fn invalid_argument(msg: impl Into<String>) -> Self {
		Self::InvalidArgument(msg.into())
	}

	pub fn invalid_state(msg: impl Into<String>) -> Self {
		Self::InvalidState(msg.into())
	}

	/// Returns the aggregated job failures if this is an aggregate error.
	pub fn as_aggregate(&self) -> Option<&AggregateFailure> {
		match self {
			Self::Aggregate(aggregate) => Some(aggregate),
			_ => None,
		}
	}

	pub fn is_cancelled(&self) -> bool {
		matches!(self, Self::Cancelled)
	}
}

pub type Result<T> = std::result::Result<T, NeedleError>;

/// Marker error a job may return to report that it observed cancellation.
///
/// The engines treat it like any other failure, but classify it as
/// [`JobFailure::Cancelled`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, thiserror::Error)]
#[error("job was cancelled")]
pub struct JobCancelled;

/// The outcome of a single job that did not complete successfully.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobFailure {
	/// The job returned an error.
	#[error("job failed: {0:#}")]
	Error(Arc<anyhow::Error>),

	/// The job returned [`JobCancelled`].
	#[error("job was cancelled")]
	Cancelled,

	/// The job body panicked.
	#[error("job panicked: {0}")]
	Panicked(String),
}

impl JobFailure {
	pub fn error(err: anyhow::Error) -> Self {
		if err.is::<JobCancelled>() {
			Self::Cancelled
		} else {
			Self::Error(Arc::new(err))
		}
	}

	pub fn panicked(payload: &(dyn std::any::Any + Send)) -> Self {
		Self::Panicked(panic_message(payload))
	}

	/// Returns the underlying error when the job returned one.
	pub fn as_error(&self) -> Option<&anyhow::Error> {
		match self {
			Self::Error(err) => Some(err),
			_ => None,
		}
	}

	pub fn is_cancelled(&self) -> bool {
		matches!(self, Self::Cancelled)
	}

	pub fn is_panic(&self) -> bool {
		matches!(self, Self::Panicked(_))
	}
}

/// Every job failure recorded during one batch run, in the order recorded.
#[derive(Debug, Clone, Default)]
pub struct AggregateFailure {
	failures: Vec<JobFailure>,
}

impl AggregateFailure {
	pub fn new(failures: Vec<JobFailure>) -> Self {
		Self { failures }
	}

	pub fn failures(&self) -> &[JobFailure] {
		&self.failures
	}

	pub fn len(&self) -> usize {
		self.failures.len()
	}

	pub fn is_empty(&self) -> bool {
		self.failures.is_empty()
	}

	pub fn into_failures(self) -> Vec<JobFailure> {
		self.failures
	}
}

impl fmt::Display for AggregateFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} job(s) failed", self.failures.len())?;
		if let Some(first) = self.failures.first() {
			write!(f, "; first: {first}")?;
		}
		Ok(())
	}
}

impl std::error::Error for AggregateFailure {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		self.failures
			.first()
			.map(|failure| failure as &(dyn std::error::Error + 'static))
	}
}

impl IntoIterator for AggregateFailure {
	type Item = JobFailure;
	type IntoIter = std::vec::IntoIter<JobFailure>;

	fn into_iter(self) -> Self::IntoIter {
		self.failures.into_iter()
	}
}

/// Extracts a readable message from a panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
	if let Some(s) = payload.downcast_ref::<&'static str>() {
		(*s).to_string()
	} else if let Some(s) = payload.downcast_ref::<String>() {
		s.clone()
	} else {
		"non-string panic payload".to_string()
	}
}

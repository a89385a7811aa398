// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What an engine does with not-yet-started jobs after a job fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnJobFailed {
	/// Skip every job that has not started yet.
	#[default]
	CancelPendingJobs,
	/// Keep running the remaining jobs.
	ContinueRunningPendingJobs,
}

impl OnJobFailed {
	pub fn cancels_pending(self) -> bool {
		matches!(self, Self::CancelPendingJobs)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::CancelPendingJobs => "cancel_pending_jobs",
			Self::ContinueRunningPendingJobs => "continue_running_pending_jobs",
		}
	}
}

impl fmt::Display for OnJobFailed {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for OnJobFailed {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
			"cancel_pending_jobs" | "cancel" => Ok(Self::CancelPendingJobs),
			"continue_running_pending_jobs" | "continue" => Ok(Self::ContinueRunningPendingJobs),
			other => Err(format!("unknown failure policy '{other}'")),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_cancels_pending() {
		assert_eq!(OnJobFailed::default(), OnJobFailed::CancelPendingJobs);
		assert!(OnJobFailed::default().cancels_pending());
		assert!(!OnJobFailed::ContinueRunningPendingJobs.cancels_pending());
	}

	#[test]
	fn test_parse_accepts_short_and_kebab_forms() {
		assert_eq!("cancel".parse::<OnJobFailed>(), Ok(OnJobFailed::CancelPendingJobs));
		assert_eq!(
			"Continue-Running-Pending-Jobs".parse::<OnJobFailed>(),
			Ok(OnJobFailed::ContinueRunningPendingJobs)
		);
		assert!("retry".parse::<OnJobFailed>().is_err());
	}

	#[test]
	fn test_display_matches_serde() {
		for policy in [
			OnJobFailed::CancelPendingJobs,
			OnJobFailed::ContinueRunningPendingJobs,
		] {
			let json = serde_json::to_string(&policy).unwrap();
			assert_eq!(json, format!("\"{policy}\""));
		}
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a [`JobProcessor`](crate::JobProcessor).
///
/// `Stopped -> Running <-> Paused`, and `Disposed` from any state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorStatus {
	#[default]
	Stopped,
	Running,
	Paused,
	Disposed,
}

impl fmt::Display for ProcessorStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			Self::Stopped => "stopped",
			Self::Running => "running",
			Self::Paused => "paused",
			Self::Disposed => "disposed",
		};
		f.write_str(s)
	}
}

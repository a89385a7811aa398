// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Default pool sizes derived from the host.

/// Logical CPUs available to this process (at least 1).
pub fn num_cpus() -> usize {
	std::thread::available_parallelism()
		.map(|n| n.get())
		.unwrap_or(1)
}

/// Default permit count for bounded batch workers: half the CPUs, minimum 1.
pub fn bounded_worker_concurrency() -> usize {
	(num_cpus() / 2).max(1)
}

/// Default worker-slot count for job processors.
pub fn processor_thread_pool_size() -> usize {
	num_cpus()
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! An async manual-reset gate.
//!
//! The gate holds a swappable [`Signal`]. Opening swaps in a signal that is
//! already open and then fires the previous one, releasing every task that
//! registered against it. Closing swaps in a fresh closed signal, so tasks
//! released by an earlier open are unaffected. A signal is never closed once
//! opened.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use needle_core::{NeedleError, Result};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::trace;

#[derive(Debug)]
struct Signal {
	opened: AtomicBool,
	notify: Notify,
}

impl Signal {
	fn new(opened: bool) -> Arc<Self> {
		Arc::new(Self {
			opened: AtomicBool::new(opened),
			notify: Notify::new(),
		})
	}

	fn is_open(&self) -> bool {
		self.opened.load(Ordering::SeqCst)
	}

	fn fire(&self) {
		self.opened.store(true, Ordering::SeqCst);
		self.notify.notify_waiters();
	}
}

/// Broadcast pause/resume signal: open lets every waiter proceed, closed
/// suspends new waiters until the next open.
#[derive(Debug)]
pub struct CooperativeGate {
	current: Mutex<Arc<Signal>>,
}

impl CooperativeGate {
	pub fn new(initially_open: bool) -> Self {
		Self {
			current: Mutex::new(Signal::new(initially_open)),
		}
	}

	/// Opens the gate and releases every current waiter. Idempotent.
	pub fn open(&self) {
		let previous = {
			let mut current = self.current.lock();
			if current.is_open() {
				return;
			}
			std::mem::replace(&mut *current, Signal::new(true))
		};
		trace!("gate opened");
		previous.fire();
	}

	/// Closes the gate. Idempotent.
	pub fn close(&self) {
		let mut current = self.current.lock();
		if current.is_open() {
			*current = Signal::new(false);
			trace!("gate closed");
		}
	}

	pub fn is_open(&self) -> bool {
		self.current.lock().is_open()
	}

	/// Waits until the gate is open.
	pub async fn wait(&self) {
		let signal = Arc::clone(&*self.current.lock());
		Self::wait_signal(&signal).await;
	}

	/// Waits until the gate is open or `cancel` fires.
	///
	/// A token that is already cancelled fails the wait even if the gate is
	/// open.
	pub async fn wait_or_cancel(&self, cancel: &CancellationToken) -> Result<()> {
		if cancel.is_cancelled() {
			return Err(NeedleError::Cancelled);
		}

		let signal = Arc::clone(&*self.current.lock());
		tokio::select! {
			biased;
			_ = cancel.cancelled() => Err(NeedleError::Cancelled),
			_ = Self::wait_signal(&signal) => Ok(()),
		}
	}

	async fn wait_signal(signal: &Signal) {
		let notified = signal.notify.notified();
		tokio::pin!(notified);
		// Register before checking so an open racing with us is not missed.
		notified.as_mut().enable();
		if signal.is_open() {
			return;
		}
		notified.await;
	}
}

impl Default for CooperativeGate {
	fn default() -> Self {
		Self::new(false)
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Callback registry with isolated invocation.
//!
//! Handlers are invoked outside the registry lock, each inside its own
//! `catch_unwind` boundary. A panicking handler is logged and skipped; it
//! never unwinds into the engine that raised the notification.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::error::panic_message;

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

/// Handle returned by [`EventHandlers::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub struct EventHandlers<A: ?Sized> {
	name: &'static str,
	#[allow(clippy::type_complexity)]
	handlers: Mutex<Vec<(SubscriptionId, Arc<dyn Fn(&A) + Send + Sync>)>>,
}

impl<A: ?Sized> EventHandlers<A> {
	pub fn new(name: &'static str) -> Self {
		Self {
			name,
			handlers: Mutex::new(Vec::new()),
		}
	}

	pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
	where
		F: Fn(&A) + Send + Sync + 'static,
	{
		let id = SubscriptionId(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed));
		self.handlers.lock().push((id, Arc::new(handler)));
		id
	}

	/// Removes a handler. Returns false if the id was not registered here.
	pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
		let mut handlers = self.handlers.lock();
		let before = handlers.len();
		handlers.retain(|(existing, _)| *existing != id);
		handlers.len() != before
	}

	pub fn len(&self) -> usize {
		self.handlers.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.handlers.lock().is_empty()
	}

	pub fn emit(&self, arg: &A) {
		let snapshot: Vec<Arc<dyn Fn(&A) + Send + Sync>> = self
			.handlers
			.lock()
			.iter()
			.map(|(_, handler)| Arc::clone(handler))
			.collect();

		for handler in snapshot {
			if let Err(payload) = catch_unwind(AssertUnwindSafe(|| handler(arg))) {
				warn!(
					event = self.name,
					panic = %panic_message(payload.as_ref()),
					"Event handler panicked"
				);
			}
		}
	}
}

impl<A: ?Sized> std::fmt::Debug for EventHandlers<A> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EventHandlers")
			.field("name", &self.name)
			.field("handlers", &self.len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::AtomicUsize;

	#[test]
	fn test_emit_reaches_every_handler() {
		let events: EventHandlers<usize> = EventHandlers::new("test");
		let total = Arc::new(AtomicUsize::new(0));

		for _ in 0..3 {
			let total = Arc::clone(&total);
			events.subscribe(move |value: &usize| {
				total.fetch_add(*value, Ordering::SeqCst);
			});
		}

		events.emit(&2);
		assert_eq!(total.load(Ordering::SeqCst), 6);
	}

	#[test]
	fn test_panicking_handler_is_isolated() {
		let events: EventHandlers<str> = EventHandlers::new("test");
		let reached = Arc::new(AtomicUsize::new(0));

		events.subscribe(|_: &str| panic!("bad subscriber"));
		let counter = Arc::clone(&reached);
		events.subscribe(move |_: &str| {
			counter.fetch_add(1, Ordering::SeqCst);
		});

		events.emit("fault");
		events.emit("fault");
		assert_eq!(reached.load(Ordering::SeqCst), 2);
	}

	#[test]
	fn test_unsubscribe() {
		let events: EventHandlers<()> = EventHandlers::new("test");
		let hits = Arc::new(AtomicUsize::new(0));
		let counter = Arc::clone(&hits);
		let id = events.subscribe(move |_| {
			counter.fetch_add(1, Ordering::SeqCst);
		});

		events.emit(&());
		assert!(events.unsubscribe(id));
		assert!(!events.unsubscribe(id));
		events.emit(&());

		assert_eq!(hits.load(Ordering::SeqCst), 1);
		assert!(events.is_empty());
	}

	#[test]
	fn test_handler_may_subscribe_during_emit() {
		let events: Arc<EventHandlers<()>> = Arc::new(EventHandlers::new("test"));
		let inner = Arc::clone(&events);
		events.subscribe(move |_| {
			inner.subscribe(|_| {});
		});

		events.emit(&());
		assert_eq!(events.len(), 2);
	}
}

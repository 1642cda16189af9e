//! Broadcast of external lifecycle results to every attached view.
//!
//! The host cannot tell which view started the external request (file pick,
//! signature capture), so every live view receives the event and matches it
//! against its own pending state. One failing hook never blocks the others.

use std::panic::{AssertUnwindSafe, catch_unwind};

use serde::Serialize;
use vellum_worker::{AffinityPort, panic_message};

use crate::actor::{Task, enqueue};
use crate::continuation::{Completion, Continuation};
use crate::dispatcher::CommandDispatcher;
use crate::registry::ViewRegistry;
use crate::tag::Tag;
use crate::view::LifecycleEvent;

/// Outcome of one lifecycle delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
	/// Number of hooks that returned normally.
	pub delivered: usize,
	/// Tags whose hook failed or panicked, in tag order.
	pub failed: Vec<Tag>,
}

/// Routes lifecycle events through a dispatcher's affinity thread.
#[derive(Clone)]
pub struct ActivityResultRouter {
	port: AffinityPort<Task>,
}

impl ActivityResultRouter {
	/// Creates a router bound to `dispatcher`.
	pub fn new(dispatcher: &CommandDispatcher) -> Self {
		Self { port: dispatcher.port() }
	}

	/// Queues `event` for delivery to every view attached when it runs.
	pub fn deliver(&self, event: LifecycleEvent) -> Completion<DeliveryReport> {
		let (reply, completion) = Continuation::new("deliver");
		tracing::trace!(request_code = event.request_code, result_code = event.result_code, "bridge.router.deliver");
		enqueue(&self.port, Task::Deliver { event, reply });
		completion
	}
}

/// Invokes every live view's lifecycle hook, in tag order, isolating failures.
pub(crate) fn fan_out(registry: &ViewRegistry, event: &LifecycleEvent) -> DeliveryReport {
	let mut report = DeliveryReport::default();
	for (tag, view) in registry.snapshot() {
		match catch_unwind(AssertUnwindSafe(|| view.on_activity_result(event))) {
			Ok(Ok(())) => report.delivered += 1,
			Ok(Err(error)) => {
				tracing::warn!(%tag, %error, "bridge.router.hook_failed");
				report.failed.push(tag);
			}
			Err(payload) => {
				tracing::warn!(%tag, panic = %panic_message(payload.as_ref()), "bridge.router.hook_panicked");
				report.failed.push(tag);
			}
		}
	}
	tracing::debug!(delivered = report.delivered, failed = report.failed.len(), "bridge.router.delivered");
	report
}

//! The affinity actor: owns the registry and executes every task.

use std::panic::{AssertUnwindSafe, catch_unwind};

use serde_json::Value;
use vellum_worker::{ActorFlow, AffinityActor, AffinityPort, CancelToken, PortError, panic_message};

use crate::continuation::Continuation;
use crate::error::{BridgeError, Result};
use crate::operation::Operation;
use crate::registry::ViewRegistry;
use crate::router::{DeliveryReport, fan_out};
use crate::tag::Tag;
use crate::view::{LifecycleEvent, ViewHandle};

/// Work item funneled onto the affinity thread.
pub(crate) enum Task {
	Attach {
		tag: Tag,
		handle: ViewHandle,
		reply: Continuation<Option<ViewHandle>>,
	},
	Detach {
		tag: Tag,
		reply: Continuation<bool>,
	},
	Command(Command),
	Deliver {
		event: LifecycleEvent,
		reply: Continuation<DeliveryReport>,
	},
}

pub(crate) struct Command {
	pub(crate) seq: u64,
	pub(crate) tag: Tag,
	pub(crate) op: Operation,
	pub(crate) cancel: CancelToken,
	pub(crate) reply: Reply,
}

/// Where a command's outcome goes.
pub(crate) enum Reply {
	Continuation(Continuation<Value>),
	/// Fire-and-forget: failures are logged and dropped.
	Detached,
}

impl Reply {
	fn complete(self, result: Result<Value>, tag: Tag, op: &'static str) {
		match self {
			Self::Continuation(reply) => {
				reply.complete(result);
			}
			Self::Detached => {
				if let Err(error) = result {
					tracing::warn!(%tag, op, %error, "bridge.post.failed");
				}
			}
		}
	}
}

impl Task {
	/// Completes the task's reply without running it.
	pub(crate) fn fail(self, error: BridgeError) {
		match self {
			Self::Attach { reply, .. } => {
				reply.reject(error);
			}
			Self::Detach { reply, .. } => {
				reply.reject(error);
			}
			Self::Command(cmd) => {
				let name = cmd.op.name();
				cmd.reply.complete(Err(error), cmd.tag, name);
			}
			Self::Deliver { reply, .. } => {
				reply.reject(error);
			}
		}
	}
}

/// Submits `task`, completing it with `Overloaded` or `Closed` when the port refuses it.
pub(crate) fn enqueue(port: &AffinityPort<Task>, task: Task) {
	match port.send(task) {
		Ok(()) => {}
		Err(PortError::Full(task)) => task.fail(BridgeError::Overloaded {
			capacity: port.capacity(),
		}),
		Err(PortError::Closed(task)) => task.fail(BridgeError::Closed),
	}
}

/// Actor state living on the affinity thread.
pub(crate) struct BridgeActor {
	registry: ViewRegistry,
}

impl BridgeActor {
	pub(crate) fn new(registry: ViewRegistry) -> Self {
		Self { registry }
	}

	/// Missing views take precedence over cancellation: a cancelled command
	/// for an unattached tag still fails with `ViewNotFound`.
	fn execute(&self, cmd: &Command) -> Result<Value> {
		let name = cmd.op.name();
		let Some(view) = self.registry.lookup(cmd.tag) else {
			tracing::trace!("bridge.command.view_not_found");
			return Err(BridgeError::ViewNotFound {
				operation: name.to_string(),
				tag: cmd.tag,
			});
		};
		if cmd.cancel.is_cancelled() {
			tracing::trace!("bridge.command.cancelled_before_start");
			return Err(BridgeError::Cancelled);
		}

		match catch_unwind(AssertUnwindSafe(|| cmd.op.invoke(view.as_ref(), &cmd.cancel))) {
			Ok(result) => result.map_err(BridgeError::from),
			Err(payload) => {
				let message = panic_message(payload.as_ref());
				tracing::error!(panic = %message, "bridge.command.panicked");
				Err(BridgeError::OperationFailed {
					code: "panic".to_string(),
					message,
				})
			}
		}
	}
}

impl AffinityActor for BridgeActor {
	type Cmd = Task;

	fn on_start(&mut self) {
		tracing::debug!(policy = ?self.registry.policy(), "bridge.actor.started");
	}

	fn handle(&mut self, task: Task) -> ActorFlow {
		match task {
			Task::Attach { tag, handle, reply } => {
				reply.complete(self.registry.register(tag, handle));
			}
			Task::Detach { tag, reply } => {
				reply.resolve(self.registry.unregister(tag).is_some());
			}
			Task::Command(cmd) => {
				let name = cmd.op.name();
				let span = tracing::trace_span!("bridge.command", seq = cmd.seq, tag = %cmd.tag, op = name);
				let _guard = span.enter();
				let result = self.execute(&cmd);
				tracing::trace!(ok = result.is_ok(), "bridge.command.completed");
				cmd.reply.complete(result, cmd.tag, name);
			}
			Task::Deliver { event, reply } => {
				reply.resolve(fan_out(&self.registry, &event));
			}
		}
		ActorFlow::Continue
	}

	fn on_stop(&mut self) {
		tracing::debug!(attached = self.registry.len(), "bridge.actor.stopped");
	}
}

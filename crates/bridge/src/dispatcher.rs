//! Command dispatcher.
//!
//! Every entry point validates on the calling thread, then hands a task to
//! the single affinity thread through a bounded FIFO port. Commands, attaches,
//! detaches and deliveries share that one queue, so a command submitted after
//! a detach of its tag observes `ViewNotFound`.
//!
//! Each submission completes exactly once:
//! - validation failure and queue rejection complete synchronously, before return
//! - otherwise the affinity thread completes it after lookup and invoke
//! - a task discarded at shutdown completes with `Closed` via its continuation's drop guard
//!
//! A view operation that never returns stalls every task queued behind it.
//! There are no timeouts.

use serde_json::Value;
use vellum_worker::{AffinityPort, AffinitySpec, AffinityThread, CancelToken, SequenceClock, ShutdownMode, ShutdownReport};

use crate::actor::{BridgeActor, Command, Reply, Task, enqueue};
use crate::config::BridgeConfig;
use crate::continuation::{Completion, Continuation};
use crate::error::{BridgeError, StartError};
use crate::operation::{Operation, UNKNOWN_OPERATION, canonical_name};
use crate::registry::ViewRegistry;
use crate::tag::Tag;
use crate::view::ViewHandle;

/// Process-wide command dispatcher. Construct once and share by reference.
pub struct CommandDispatcher {
	thread: AffinityThread<Task>,
	port: AffinityPort<Task>,
	seq: SequenceClock,
}

/// Requests cancellation of one in-flight cancellable command.
///
/// Cloneable, thread-safe and idempotent. Cancelling after the command
/// completed has no effect.
#[derive(Debug, Clone)]
pub struct CancelHandle {
	token: CancelToken,
}

impl CancelHandle {
	/// Signals the command to stop.
	pub fn cancel(&self) {
		self.token.cancel();
	}

	/// Returns true once cancellation was requested.
	pub fn is_cancelled(&self) -> bool {
		self.token.is_cancelled()
	}
}

/// A submitted cancellable command.
#[derive(Debug)]
pub struct PendingCommand {
	/// The command's result.
	pub completion: Completion<Value>,
	/// Cancels the command.
	pub cancel: CancelHandle,
}

impl CommandDispatcher {
	/// Validates `config` and spawns the affinity thread.
	pub fn start(config: BridgeConfig) -> Result<Self, StartError> {
		config.validate()?;
		let policy = config.duplicate_tags;
		let spec = AffinitySpec::new(config.thread_name.clone()).capacity(config.queue_capacity);
		let thread = AffinityThread::spawn(spec, move || BridgeActor::new(ViewRegistry::new(policy)))?;
		tracing::info!(
			thread = %config.thread_name,
			capacity = config.queue_capacity,
			duplicate_tags = ?policy,
			"bridge.dispatcher.started"
		);
		Ok(Self {
			port: thread.port(),
			thread,
			seq: SequenceClock::new(),
		})
	}

	/// Validates and submits a command by wire name.
	pub fn dispatch(&self, tag: impl Into<Tag>, name: &str, args: &[Value]) -> Completion<Value> {
		let tag = tag.into();
		match Operation::parse(name, args) {
			Ok(op) => self.dispatch_op(tag, op),
			Err(error) => Self::rejected(tag, name, error),
		}
	}

	/// Submits an already validated operation.
	pub fn dispatch_op(&self, tag: impl Into<Tag>, op: Operation) -> Completion<Value> {
		self.submit(tag.into(), op, CancelToken::new())
	}

	/// Validates and submits a cancellable command.
	///
	/// Only long-running operations accept cancellation; any other operation is
	/// rejected with `InvalidArgument`. A cancel that lands before the command
	/// starts prevents it from running. One that lands mid-flight is observed by
	/// the view cooperatively; the command then completes with `Cancelled` or,
	/// if the view finished first, with its normal result. A tag with no live
	/// view fails with `ViewNotFound` whether or not the command was cancelled.
	pub fn dispatch_cancellable(&self, tag: impl Into<Tag>, name: &str, args: &[Value]) -> PendingCommand {
		let tag = tag.into();
		let token = CancelToken::new();
		let cancel = CancelHandle { token: token.clone() };
		let completion = match Operation::parse(name, args) {
			Ok(op) if op.is_cancellable() => self.submit(tag, op, token),
			Ok(op) => Self::rejected(tag, name, BridgeError::invalid(format!("{} is not cancellable", op.name()))),
			Err(error) => Self::rejected(tag, name, error),
		};
		PendingCommand { completion, cancel }
	}

	/// Submits a command whose outcome the caller does not observe.
	///
	/// Validation and execution failures are logged and dropped.
	pub fn post(&self, tag: impl Into<Tag>, name: &str, args: &[Value]) {
		let tag = tag.into();
		let op = match Operation::parse(name, args) {
			Ok(op) => op,
			Err(error) => {
				tracing::warn!(%tag, op = name, %error, "bridge.post.invalid");
				return;
			}
		};
		enqueue(
			&self.port,
			Task::Command(Command {
				seq: self.seq.next(),
				tag,
				op,
				cancel: CancelToken::new(),
				reply: Reply::Detached,
			}),
		);
	}

	/// Attaches `handle` under `tag`.
	///
	/// Resolves with the displaced handle when the replace policy evicted a live
	/// view, so the caller can invalidate it.
	pub fn attach(&self, tag: impl Into<Tag>, handle: ViewHandle) -> Completion<Option<ViewHandle>> {
		let tag = tag.into();
		let (reply, completion) = Continuation::new("attach");
		tracing::debug!(%tag, "bridge.dispatcher.attach");
		enqueue(&self.port, Task::Attach { tag, handle, reply });
		completion
	}

	/// Detaches `tag`. Resolves with whether a mapping was removed.
	pub fn detach(&self, tag: impl Into<Tag>) -> Completion<bool> {
		let tag = tag.into();
		let (reply, completion) = Continuation::new("detach");
		tracing::debug!(%tag, "bridge.dispatcher.detach");
		enqueue(&self.port, Task::Detach { tag, reply });
		completion
	}

	/// Queue capacity.
	pub fn capacity(&self) -> usize {
		self.port.capacity()
	}

	/// Number of submissions rejected with `Overloaded` so far.
	pub fn overflow_count(&self) -> u64 {
		self.port.overflow_count()
	}

	/// Returns true when called on the affinity thread.
	pub fn is_affinity_thread(&self) -> bool {
		self.thread.is_current()
	}

	/// Stops accepting work, runs everything already queued, and joins the affinity thread.
	pub fn shutdown(self) -> ShutdownReport {
		self.stop(ShutdownMode::Drain)
	}

	/// Stops after the current task. Queued tasks complete with `Closed`.
	pub fn abort(self) -> ShutdownReport {
		self.stop(ShutdownMode::Immediate)
	}

	pub(crate) fn port(&self) -> AffinityPort<Task> {
		self.port.clone()
	}

	fn stop(self, mode: ShutdownMode) -> ShutdownReport {
		let report = self.thread.shutdown(mode);
		tracing::info!(handled = report.handled(), dropped = report.dropped(), ?mode, "bridge.dispatcher.stopped");
		report
	}

	fn submit(&self, tag: Tag, op: Operation, cancel: CancelToken) -> Completion<Value> {
		let (reply, completion) = Continuation::new(op.name());
		enqueue(
			&self.port,
			Task::Command(Command {
				seq: self.seq.next(),
				tag,
				op,
				cancel,
				reply: Reply::Continuation(reply),
			}),
		);
		completion
	}

	fn rejected(tag: Tag, name: &str, error: BridgeError) -> Completion<Value> {
		tracing::trace!(%tag, op = name, %error, "bridge.dispatch.invalid");
		Completion::failed(canonical_name(name).unwrap_or(UNKNOWN_OPERATION), error)
	}
}

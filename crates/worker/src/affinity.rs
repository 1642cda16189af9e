//! Dedicated affinity thread with a bounded FIFO ingress port.
//!
//! An [`AffinityThread`] owns one [`AffinityActor`] on one named OS thread.
//! Commands submitted through any clone of its [`AffinityPort`] share a single
//! ordered queue, so they run strictly one at a time and in submission order.
//! The actor is constructed on the affinity thread by a factory closure and
//! never leaves it, which lets it hold state that is not `Send`.
//!
//! The actor may block inside [`AffinityActor::handle`]; everything queued
//! behind it waits. There is no timeout: a handler that never returns stalls
//! the queue until the process exits.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{JoinHandle, ThreadId};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::panic::panic_message;
use crate::spawn::spawn_named_thread;

/// Default ingress queue capacity.
const DEFAULT_CAPACITY: usize = 1024;

/// Largest ingress queue capacity an [`AffinitySpec`] accepts.
pub const MAX_CAPACITY: usize = 1 << 20;

/// Overflow warnings are rate limited to one per this many dropped sends.
const OVERFLOW_LOG_EVERY: u64 = 1024;

/// Continuation directive from one command handling step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorFlow {
	/// Continue processing commands.
	Continue,
	/// Stop the affinity thread after this command.
	Stop,
}

/// State machine executed on the affinity thread.
pub trait AffinityActor: 'static {
	/// Command type accepted through the port.
	type Cmd: Send + 'static;

	/// Called once on the affinity thread before the first command.
	fn on_start(&mut self) {}

	/// Handles one command. Never re-entered.
	fn handle(&mut self, cmd: Self::Cmd) -> ActorFlow;

	/// Called once on the affinity thread after the loop exits.
	fn on_stop(&mut self) {}
}

/// Builder spec for one affinity thread.
#[derive(Debug, Clone)]
pub struct AffinitySpec {
	pub(crate) name: String,
	pub(crate) capacity: usize,
}

impl AffinitySpec {
	/// Creates a spec for a thread with the given name and default capacity.
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			capacity: DEFAULT_CAPACITY,
		}
	}

	/// Sets the ingress queue capacity, clamped to `1..=MAX_CAPACITY`.
	#[must_use]
	pub fn capacity(mut self, capacity: usize) -> Self {
		let clamped = capacity.clamp(1, MAX_CAPACITY);
		if clamped != capacity {
			tracing::warn!(requested = capacity, capacity = clamped, "worker.affinity.capacity_clamped");
		}
		self.capacity = clamped;
		self
	}
}

/// Rejected enqueue. The command is handed back so the caller can complete it.
#[derive(Debug)]
pub enum PortError<Cmd> {
	/// The queue is at capacity.
	Full(Cmd),
	/// The affinity thread has stopped or is stopping.
	Closed(Cmd),
}

impl<Cmd> PortError<Cmd> {
	/// Returns the rejected command.
	pub fn into_inner(self) -> Cmd {
		match self {
			Self::Full(cmd) | Self::Closed(cmd) => cmd,
		}
	}
}

impl<Cmd> std::fmt::Display for PortError<Cmd> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Full(_) => write!(f, "affinity queue full"),
			Self::Closed(_) => write!(f, "affinity thread closed"),
		}
	}
}

impl<Cmd: std::fmt::Debug> std::error::Error for PortError<Cmd> {}

enum Envelope<Cmd> {
	Cmd(Cmd),
	/// Unblocks a parked receive so the loop re-checks its stop signals.
	Wake,
}

/// Stop signals shared between the handle, all ports and the loop.
#[derive(Debug, Clone, Default)]
struct StopSignals {
	/// No new commands are accepted.
	closing: CancellationToken,
	/// Stop after the current command; queued commands are dropped.
	abort: CancellationToken,
}

/// Cloneable, non-blocking enqueue port for one affinity thread.
pub struct AffinityPort<Cmd>
where
	Cmd: Send + 'static,
{
	tx: mpsc::Sender<Envelope<Cmd>>,
	stop: StopSignals,
	drops: Arc<AtomicU64>,
	capacity: usize,
}

impl<Cmd> Clone for AffinityPort<Cmd>
where
	Cmd: Send + 'static,
{
	fn clone(&self) -> Self {
		Self {
			tx: self.tx.clone(),
			stop: self.stop.clone(),
			drops: Arc::clone(&self.drops),
			capacity: self.capacity,
		}
	}
}

impl<Cmd> AffinityPort<Cmd>
where
	Cmd: Send + 'static,
{
	/// Non-blocking enqueue. Returns the command back if the queue is full or closed.
	pub fn send(&self, cmd: Cmd) -> Result<(), PortError<Cmd>> {
		if self.stop.closing.is_cancelled() {
			return Err(PortError::Closed(cmd));
		}
		match self.tx.try_send(Envelope::Cmd(cmd)) {
			Ok(()) => Ok(()),
			Err(mpsc::error::TrySendError::Full(Envelope::Cmd(cmd))) => {
				let count = self.drops.fetch_add(1, Ordering::Relaxed);
				if count % OVERFLOW_LOG_EVERY == 0 {
					tracing::warn!(drops = count + 1, capacity = self.capacity, "worker.affinity.queue_full");
				}
				Err(PortError::Full(cmd))
			}
			Err(mpsc::error::TrySendError::Closed(Envelope::Cmd(cmd))) => Err(PortError::Closed(cmd)),
			Err(_) => unreachable!("ports only enqueue commands"),
		}
	}

	/// Queue capacity.
	pub fn capacity(&self) -> usize {
		self.capacity
	}

	/// Number of sends rejected because the queue was full.
	pub fn overflow_count(&self) -> u64 {
		self.drops.load(Ordering::Relaxed)
	}

	/// Returns true once the thread stopped accepting commands.
	pub fn is_closed(&self) -> bool {
		self.stop.closing.is_cancelled() || self.tx.is_closed()
	}
}

/// Shutdown mode for an affinity thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
	/// Stop accepting commands, run everything already queued, then exit.
	Drain,
	/// Exit after the current command. Queued commands are dropped on the affinity thread.
	Immediate,
}

/// Shutdown report for one affinity thread.
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
	handled: u64,
	dropped: u64,
	panic: Option<String>,
	self_join: bool,
}

impl ShutdownReport {
	/// Commands handled over the thread's lifetime.
	pub fn handled(&self) -> u64 {
		self.handled
	}

	/// Commands still queued at exit that were dropped unhandled.
	pub fn dropped(&self) -> u64 {
		self.dropped
	}

	/// Panic message if the actor panicked.
	pub fn panic(&self) -> Option<&str> {
		self.panic.as_deref()
	}

	/// True if shutdown was requested from the affinity thread itself and the join was skipped.
	pub fn self_join(&self) -> bool {
		self.self_join
	}

	/// True if the thread exited without panicking and was joined.
	pub fn completed(&self) -> bool {
		self.panic.is_none() && !self.self_join
	}
}

#[derive(Debug, Default)]
struct LoopSummary {
	handled: u64,
	dropped: u64,
}

/// Handle for one running affinity thread.
pub struct AffinityThread<Cmd>
where
	Cmd: Send + 'static,
{
	name: String,
	port: AffinityPort<Cmd>,
	thread_id: ThreadId,
	join: Option<JoinHandle<LoopSummary>>,
}

impl<Cmd> AffinityThread<Cmd>
where
	Cmd: Send + 'static,
{
	/// Spawns the affinity thread. `factory` runs on the new thread.
	pub fn spawn<A, F>(spec: AffinitySpec, factory: F) -> std::io::Result<Self>
	where
		A: AffinityActor<Cmd = Cmd>,
		F: FnOnce() -> A + Send + 'static,
	{
		let (tx, rx) = mpsc::channel(spec.capacity);
		let stop = StopSignals::default();
		let loop_stop = stop.clone();
		let loop_name = spec.name.clone();
		let join = spawn_named_thread(spec.name.clone(), move || run_loop(factory(), rx, loop_stop, &loop_name))?;
		let thread_id = join.thread().id();
		tracing::debug!(thread = %spec.name, capacity = spec.capacity, "worker.affinity.started");

		Ok(Self {
			name: spec.name,
			port: AffinityPort {
				tx,
				stop,
				drops: Arc::new(AtomicU64::new(0)),
				capacity: spec.capacity,
			},
			thread_id,
			join: Some(join),
		})
	}

	/// Thread name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Returns a cloneable enqueue port.
	pub fn port(&self) -> AffinityPort<Cmd> {
		self.port.clone()
	}

	/// Identifier of the affinity thread.
	pub fn thread_id(&self) -> ThreadId {
		self.thread_id
	}

	/// Returns true when called on the affinity thread.
	pub fn is_current(&self) -> bool {
		std::thread::current().id() == self.thread_id
	}

	/// Stops the thread and joins it.
	///
	/// Called from the affinity thread itself, the stop is requested but the
	/// join is skipped and the report is flagged with [`ShutdownReport::self_join`].
	pub fn shutdown(mut self, mode: ShutdownMode) -> ShutdownReport {
		self.request_stop(mode);
		if self.is_current() {
			tracing::warn!(thread = %self.name, "worker.affinity.self_join");
			self.join = None;
			return ShutdownReport {
				self_join: true,
				..ShutdownReport::default()
			};
		}
		let Some(join) = self.join.take() else {
			return ShutdownReport::default();
		};
		match join.join() {
			Ok(summary) => ShutdownReport {
				handled: summary.handled,
				dropped: summary.dropped,
				panic: None,
				self_join: false,
			},
			Err(payload) => {
				let msg = panic_message(payload.as_ref());
				tracing::error!(thread = %self.name, panic = %msg, "worker.affinity.panicked");
				ShutdownReport {
					panic: Some(msg),
					..ShutdownReport::default()
				}
			}
		}
	}

	fn request_stop(&self, mode: ShutdownMode) {
		self.port.stop.closing.cancel();
		if mode == ShutdownMode::Immediate {
			self.port.stop.abort.cancel();
		}
		// A full queue means the loop is busy and re-checks the signals after its current command.
		let _ = self.port.tx.try_send(Envelope::Wake);
	}
}

impl<Cmd> Drop for AffinityThread<Cmd>
where
	Cmd: Send + 'static,
{
	fn drop(&mut self) {
		if self.join.is_some() {
			self.request_stop(ShutdownMode::Immediate);
		}
	}
}

fn run_loop<A: AffinityActor>(mut actor: A, mut rx: mpsc::Receiver<Envelope<A::Cmd>>, stop: StopSignals, name: &str) -> LoopSummary {
	let mut summary = LoopSummary::default();
	actor.on_start();

	loop {
		if stop.abort.is_cancelled() {
			break;
		}
		let envelope = if stop.closing.is_cancelled() {
			match rx.try_recv() {
				Ok(envelope) => envelope,
				Err(_) => break,
			}
		} else {
			match rx.blocking_recv() {
				Some(envelope) => envelope,
				None => break,
			}
		};
		let Envelope::Cmd(cmd) = envelope else {
			continue;
		};
		summary.handled += 1;
		if actor.handle(cmd) == ActorFlow::Stop {
			stop.closing.cancel();
			stop.abort.cancel();
			break;
		}
	}

	// Late sends that raced the stop signals land here and are dropped with the rest.
	rx.close();
	while let Ok(envelope) = rx.try_recv() {
		if let Envelope::Cmd(cmd) = envelope {
			summary.dropped += 1;
			drop(cmd);
		}
	}

	actor.on_stop();
	tracing::debug!(thread = %name, handled = summary.handled, dropped = summary.dropped, "worker.affinity.stopped");
	summary
}

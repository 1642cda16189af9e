//! Single-shot completion channel.
//!
//! A [`Continuation`] is the completing side, carried with a command to the
//! affinity thread. A [`Completion`] is the caller's side. The pair wraps a
//! oneshot channel; the sender sits behind a mutex so that completion is
//! idempotent regardless of how many paths race to complete it. Only the first
//! `resolve`/`reject` takes effect.
//!
//! A continuation dropped while still pending rejects with
//! [`BridgeError::Closed`], so an accepted command is never left hanging even if
//! its task is discarded at shutdown or unwound by a panic.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{BridgeError, Result};

/// Completing side of a single-shot result.
pub struct Continuation<T> {
	tx: Mutex<Option<oneshot::Sender<Result<T>>>>,
	label: &'static str,
}

/// Caller side of a single-shot result.
///
/// Await it from async code, or call [`Completion::wait`] from a plain thread.
#[must_use = "a completion carries the command's only result"]
pub struct Completion<T> {
	rx: oneshot::Receiver<Result<T>>,
	label: &'static str,
}

impl<T> Continuation<T> {
	/// Creates a linked continuation/completion pair.
	///
	/// `label` names the operation in diagnostics.
	#[allow(clippy::new_ret_no_self)]
	pub fn new(label: &'static str) -> (Continuation<T>, Completion<T>) {
		let (tx, rx) = oneshot::channel();
		(
			Continuation {
				tx: Mutex::new(Some(tx)),
				label,
			},
			Completion { rx, label },
		)
	}

	/// Completes with a value. Returns `true` only if this call took effect.
	pub fn resolve(&self, value: T) -> bool {
		self.complete(Ok(value))
	}

	/// Completes with an error. Returns `true` only if this call took effect.
	pub fn reject(&self, error: BridgeError) -> bool {
		self.complete(Err(error))
	}

	/// Completes with a result. Returns `true` only if this call took effect.
	///
	/// Later calls are ignored and logged. A caller that already dropped its
	/// [`Completion`] still counts as completed.
	pub fn complete(&self, result: Result<T>) -> bool {
		let Some(tx) = self.tx.lock().take() else {
			tracing::warn!(op = self.label, "bridge.continuation.already_completed");
			return false;
		};
		if tx.send(result).is_err() {
			tracing::trace!(op = self.label, "bridge.continuation.caller_gone");
		}
		true
	}

	/// Returns true once a result has been delivered.
	pub fn is_completed(&self) -> bool {
		self.tx.lock().is_none()
	}

	/// Operation label.
	pub fn label(&self) -> &'static str {
		self.label
	}
}

impl<T> Drop for Continuation<T> {
	fn drop(&mut self) {
		if let Some(tx) = self.tx.get_mut().take() {
			tracing::debug!(op = self.label, "bridge.continuation.dropped_pending");
			let _ = tx.send(Err(BridgeError::Closed));
		}
	}
}

impl<T> std::fmt::Debug for Continuation<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Continuation")
			.field("label", &self.label)
			.field("completed", &self.is_completed())
			.finish()
	}
}

impl<T> Completion<T> {
	/// Returns a completion that already carries `error`.
	pub fn failed(label: &'static str, error: BridgeError) -> Self {
		let (continuation, completion) = Continuation::new(label);
		continuation.reject(error);
		completion
	}

	/// Blocks the current thread until the result arrives.
	///
	/// # Panics
	///
	/// Panics if called from within an asynchronous execution context; await
	/// the completion instead.
	pub fn wait(self) -> Result<T> {
		self.rx.blocking_recv().unwrap_or(Err(BridgeError::Closed))
	}

	/// Takes the result if it has arrived, without blocking.
	///
	/// Returns `None` while pending. The result can be taken once; later calls
	/// report [`BridgeError::Closed`].
	pub fn try_result(&mut self) -> Option<Result<T>> {
		match self.rx.try_recv() {
			Ok(result) => Some(result),
			Err(oneshot::error::TryRecvError::Empty) => None,
			Err(oneshot::error::TryRecvError::Closed) => Some(Err(BridgeError::Closed)),
		}
	}

	/// Operation label.
	pub fn label(&self) -> &'static str {
		self.label
	}
}

impl<T> Future for Completion<T> {
	type Output = Result<T>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		Pin::new(&mut self.rx).poll(cx).map(|received| received.unwrap_or(Err(BridgeError::Closed)))
	}
}

impl<T> std::fmt::Debug for Completion<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Completion").field("label", &self.label).finish_non_exhaustive()
	}
}

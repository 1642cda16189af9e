use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

/// Monotonic sequence clock for correlating submitted work in logs.
#[derive(Debug, Default, Clone)]
pub struct SequenceClock {
	next: Arc<AtomicU64>,
}

impl SequenceClock {
	/// Creates a new clock whose first value is 1.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the next sequence number.
	pub fn next(&self) -> u64 {
		self.next.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
	}
}

/// Cooperative cancellation signal for one unit of in-flight work.
///
/// The submitting side keeps a clone and calls [`CancelToken::cancel`] from any
/// thread; the executing side polls [`CancelToken::is_cancelled`] at its own
/// safe points. Cancelling is idempotent.
#[derive(Debug, Default, Clone)]
pub struct CancelToken {
	cancel: CancellationToken,
}

impl CancelToken {
	/// Creates a fresh, uncancelled token.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns true when cancellation is requested.
	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Requests cancellation.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}
}

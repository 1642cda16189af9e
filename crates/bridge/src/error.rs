//! Error types for command dispatch and configuration.

use std::path::PathBuf;

use thiserror::Error;

use crate::tag::Tag;

/// Terminal failure of one dispatched command, attach, detach or delivery.
///
/// Every failure is final for the invocation that produced it. Nothing in the
/// bridge retries; callers decide whether to resubmit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
	/// Structural validation failed before the command reached the affinity thread.
	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	/// No live view is attached under the tag.
	#[error("{operation}: no view attached for tag {tag}")]
	ViewNotFound {
		/// Operation name the caller dispatched.
		operation: String,
		/// Tag that failed to resolve.
		tag: Tag,
	},

	/// The view reported a failure, forwarded verbatim.
	#[error("{code}: {message}")]
	OperationFailed {
		/// View-defined failure code.
		code: String,
		/// View-defined failure message.
		message: String,
	},

	/// The command was cancelled before it produced a result.
	#[error("operation cancelled")]
	Cancelled,

	/// The affinity queue was at capacity when the command was submitted.
	#[error("dispatcher overloaded (queue capacity {capacity})")]
	Overloaded {
		/// Configured queue capacity.
		capacity: usize,
	},

	/// Attach was rejected because a live view already holds the tag.
	#[error("tag {0} is already attached")]
	TagInUse(Tag),

	/// The dispatcher has shut down or dropped the command unhandled.
	#[error("dispatcher closed")]
	Closed,
}

impl BridgeError {
	/// Stable, machine-readable kind for host bindings.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::InvalidArgument(_) => "invalidArgument",
			Self::ViewNotFound { .. } => "viewNotFound",
			Self::OperationFailed { .. } => "operationFailed",
			Self::Cancelled => "cancelled",
			Self::Overloaded { .. } => "overloaded",
			Self::TagInUse(_) => "tagInUse",
			Self::Closed => "closed",
		}
	}

	pub(crate) fn invalid(message: impl Into<String>) -> Self {
		Self::InvalidArgument(message.into())
	}
}

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur when loading or validating [`crate::BridgeConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// Error parsing TOML syntax or structure.
	#[error("TOML parse error: {0}")]
	Parse(#[from] toml::de::Error),

	/// A value parsed but is out of range.
	#[error("invalid configuration: {0}")]
	Invalid(String),
}

/// Errors that can occur when starting a [`crate::CommandDispatcher`].
#[derive(Debug, Error)]
pub enum StartError {
	/// The configuration failed validation.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// The affinity thread could not be spawned.
	#[error("failed to spawn affinity thread: {0}")]
	Spawn(#[from] std::io::Error),
}

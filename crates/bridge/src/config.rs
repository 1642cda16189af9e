//! Dispatcher configuration.
//!
//! ```toml
//! queue-capacity = 1024
//! thread-name = "vellum-affinity"
//! duplicate-tags = "reject"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default affinity queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Largest accepted queue capacity.
pub const MAX_QUEUE_CAPACITY: usize = vellum_worker::MAX_CAPACITY;

/// Default affinity thread name.
pub const DEFAULT_THREAD_NAME: &str = "vellum-affinity";

/// What attach does when a live view already holds the tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateTagPolicy {
	/// Fail the attach with `TagInUse`; the existing view stays attached.
	#[default]
	Reject,
	/// Install the new view and hand the displaced handle back to the caller.
	Replace,
}

/// [`crate::CommandDispatcher`] settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct BridgeConfig {
	/// Maximum number of queued tasks before submissions fail with `Overloaded`.
	pub queue_capacity: usize,
	/// Name of the affinity thread.
	pub thread_name: String,
	/// Duplicate attach policy.
	pub duplicate_tags: DuplicateTagPolicy,
}

impl Default for BridgeConfig {
	fn default() -> Self {
		Self {
			queue_capacity: DEFAULT_QUEUE_CAPACITY,
			thread_name: DEFAULT_THREAD_NAME.to_string(),
			duplicate_tags: DuplicateTagPolicy::default(),
		}
	}
}

impl BridgeConfig {
	/// Parses and validates a TOML document.
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	/// Reads, parses and validates a TOML file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let input = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&input)
	}

	/// Checks value ranges.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.queue_capacity == 0 {
			return Err(ConfigError::Invalid("queue-capacity must be greater than 0".into()));
		}
		if self.queue_capacity > MAX_QUEUE_CAPACITY {
			return Err(ConfigError::Invalid(format!("queue-capacity must be at most {MAX_QUEUE_CAPACITY}")));
		}
		if self.thread_name.trim().is_empty() {
			return Err(ConfigError::Invalid("thread-name must not be empty".into()));
		}
		if self.thread_name.contains('\0') {
			return Err(ConfigError::Invalid("thread-name must not contain NUL".into()));
		}
		Ok(())
	}

	/// Sets the queue capacity.
	#[must_use]
	pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
		self.queue_capacity = capacity;
		self
	}

	/// Sets the duplicate attach policy.
	#[must_use]
	pub fn with_duplicate_tags(mut self, policy: DuplicateTagPolicy) -> Self {
		self.duplicate_tags = policy;
		self
	}
}

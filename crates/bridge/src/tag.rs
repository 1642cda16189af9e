use std::fmt;

use serde::{Deserialize, Serialize};

/// Externally assigned handle naming one attached view.
///
/// Tags are opaque to the bridge. A tag is unique only while its view is
/// attached; after detach the host may reuse it for a different view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(i32);

impl Tag {
	/// Wraps a raw host tag.
	pub const fn new(raw: i32) -> Self {
		Self(raw)
	}

	/// Returns the raw host tag.
	pub const fn get(self) -> i32 {
		self.0
	}
}

impl From<i32> for Tag {
	fn from(raw: i32) -> Self {
		Self(raw)
	}
}

impl fmt::Display for Tag {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

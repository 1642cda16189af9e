//! Tag to view mapping.
//!
//! Owned by the affinity actor and touched only on the affinity thread, so it
//! carries no locks. Entries are created by attach and removed by detach;
//! command traffic only reads.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::DuplicateTagPolicy;
use crate::error::{BridgeError, Result};
use crate::tag::Tag;
use crate::view::{DocumentView, ViewHandle};

/// Non-owning tag to view map.
#[derive(Debug, Default)]
pub struct ViewRegistry {
	views: HashMap<Tag, ViewHandle>,
	policy: DuplicateTagPolicy,
}

impl ViewRegistry {
	/// Creates an empty registry with the given duplicate-tag policy.
	pub fn new(policy: DuplicateTagPolicy) -> Self {
		Self {
			views: HashMap::new(),
			policy,
		}
	}

	/// Installs `handle` under `tag`.
	///
	/// A tag whose previous view was already dropped by its owner counts as
	/// free. A tag held by a live view is rejected with [`BridgeError::TagInUse`]
	/// or replaced, per the policy; on replace the displaced handle is returned.
	pub fn register(&mut self, tag: Tag, handle: ViewHandle) -> Result<Option<ViewHandle>> {
		let occupied = self.views.get(&tag).is_some_and(ViewHandle::is_live);
		if !occupied {
			self.views.insert(tag, handle);
			tracing::debug!(%tag, "bridge.registry.registered");
			return Ok(None);
		}

		match self.policy {
			DuplicateTagPolicy::Reject => {
				tracing::debug!(%tag, "bridge.registry.tag_in_use");
				Err(BridgeError::TagInUse(tag))
			}
			DuplicateTagPolicy::Replace => {
				tracing::warn!(%tag, "bridge.registry.replaced");
				Ok(self.views.insert(tag, handle))
			}
		}
	}

	/// Removes the mapping for `tag`. Absent tags are a no-op.
	pub fn unregister(&mut self, tag: Tag) -> Option<ViewHandle> {
		let removed = self.views.remove(&tag);
		tracing::debug!(%tag, removed = removed.is_some(), "bridge.registry.unregistered");
		removed
	}

	/// Resolves `tag` to a strong reference for one invocation.
	///
	/// A mapping whose view was dropped by its owner resolves to `None`; the
	/// stale entry stays until detach removes it.
	pub fn lookup(&self, tag: Tag) -> Option<Arc<dyn DocumentView>> {
		let handle = self.views.get(&tag)?;
		let view = handle.upgrade();
		if view.is_none() {
			tracing::debug!(%tag, "bridge.registry.stale_handle");
		}
		view
	}

	/// Live views ordered by tag.
	pub fn snapshot(&self) -> Vec<(Tag, Arc<dyn DocumentView>)> {
		let mut live: Vec<_> = self
			.views
			.iter()
			.filter_map(|(tag, handle)| handle.upgrade().map(|view| (*tag, view)))
			.collect();
		live.sort_by_key(|(tag, _)| *tag);
		live
	}

	/// Returns true if `tag` maps to a live view.
	pub fn contains(&self, tag: Tag) -> bool {
		self.views.get(&tag).is_some_and(ViewHandle::is_live)
	}

	/// Number of mappings, including stale ones not yet detached.
	pub fn len(&self) -> usize {
		self.views.len()
	}

	/// Returns true if no mapping exists.
	pub fn is_empty(&self) -> bool {
		self.views.is_empty()
	}

	/// Active duplicate-tag policy.
	pub fn policy(&self) -> DuplicateTagPolicy {
		self.policy
	}
}

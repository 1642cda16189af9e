//! Tag-addressed command dispatch onto thread-affine document views.
//!
//! A host control layer addresses live viewer instances by small integer
//! [`Tag`]s. The [`CommandDispatcher`] funnels every command, attach, detach
//! and lifecycle delivery onto one affinity thread, where the [`ViewRegistry`]
//! resolves tags and views are invoked one call at a time. Each submission
//! returns a [`Completion`] that resolves or rejects exactly once.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use vellum_bridge::{BridgeConfig, CommandDispatcher, DocumentView, ViewHandle, ViewResult};
//!
//! struct Doc;
//!
//! impl DocumentView for Doc {
//! 	fn page_count(&self) -> ViewResult<u32> {
//! 		Ok(10)
//! 	}
//! }
//!
//! let dispatcher = CommandDispatcher::start(BridgeConfig::default()).unwrap();
//! let doc = Arc::new(Doc);
//! dispatcher.attach(5, ViewHandle::new(&doc)).wait().unwrap();
//! assert_eq!(dispatcher.dispatch(5, "getPageCount", &[]).wait().unwrap(), 10);
//! dispatcher.shutdown();
//! ```

#![warn(missing_docs)]

mod actor;
mod config;
mod continuation;
mod dispatcher;
mod error;
mod model;
mod operation;
mod registry;
mod router;
mod tag;
mod view;

pub use config::{BridgeConfig, DEFAULT_QUEUE_CAPACITY, DEFAULT_THREAD_NAME, DuplicateTagPolicy, MAX_QUEUE_CAPACITY};
pub use continuation::{Completion, Continuation};
pub use dispatcher::{CancelHandle, CommandDispatcher, PendingCommand};
pub use error::{BridgeError, ConfigError, Result, StartError};
pub use model::{AnnotationFlag, AnnotationFlagKind, Dimensions, FieldFlag, OutlineEntry, PageBox, Rgb, SearchMatch, SearchQuery};
pub use operation::{OPERATION_NAMES, Operation, canonical_name};
pub use registry::ViewRegistry;
pub use router::{ActivityResultRouter, DeliveryReport};
pub use tag::Tag;
pub use vellum_worker::{CancelToken, ShutdownReport};
pub use view::{DocumentView, LifecycleEvent, ViewError, ViewHandle, ViewResult};

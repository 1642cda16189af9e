//! Affinity-thread runtime primitives.
//!
//! This crate provides the execution substrate for thread-affine state:
//! * [`AffinityThread`]: one named OS thread that owns an [`AffinityActor`] and
//!   runs its commands strictly one at a time, in submission order
//! * [`AffinityPort`]: cloneable, non-blocking, bounded enqueue port usable from any thread
//! * [`CancelToken`]: cooperative cancellation signal shared with in-flight work
//! * [`panic_message`]: best-effort extraction of panic payload text

#![warn(missing_docs)]

mod affinity;
mod panic;
mod spawn;
mod token;

pub use affinity::{ActorFlow, AffinityActor, AffinityPort, AffinitySpec, AffinityThread, MAX_CAPACITY, PortError, ShutdownMode, ShutdownReport};
pub use panic::panic_message;
pub use spawn::spawn_named_thread;
pub use token::{CancelToken, SequenceClock};

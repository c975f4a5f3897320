//! A portable systems foundation: pluggable byte-stream channels, a
//! format-agnostic structured serializer, and the concurrency primitives
//! and bounded queues built on top of both.
//!
//! The three layers are meant to be read bottom-up:
//!
//! - [`sync`] — mutex, rwlock, condvar, barrier, atomic counter, thread
//!   handle. The substrate everything else is built on.
//! - [`channel`] — [`channel::IOChannel`], a uniform byte-stream with
//!   pluggable transport back-ends (file, fd, mmap, tcp, udp, stdio, null,
//!   calc).
//! - [`serialize`] — [`serialize::Serialize`], a directed traversal driver
//!   that turns a type's `beginType`/`endType`/leaf calls into bytes on a
//!   channel, through a pluggable wire format.
//! - [`pqueue`] and [`workqueue`] — a bounded persistent queue and a
//!   thread-pool, both built on the three layers below.
//!
//! The concurrency model throughout is blocking OS threads with timeouts;
//! there is no async runtime here and none is meant to appear.

pub mod channel;
pub mod pqueue;
pub mod serialize;
pub mod sync;
pub mod workqueue;

pub use channel::{AccessMode, ChannelError, IOChannel, Permissions};
pub use pqueue::{PQueue, PQueueArray, PQueueError};
pub use serialize::{Serializable, Serialize, SerializeError};
pub use workqueue::{WorkQueue, WorkQueueError, WorkQueueTask, WorkQueueTaskStatus};

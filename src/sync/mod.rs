//! Synchronization primitives the rest of the crate is built on.
//!
//! These are thin, typed wrappers over `std::sync` rather than a
//! reimplementation: a re-entrant-free, robust mutex in the original C
//! library collapses into `std::sync::Mutex` plus poison recovery once a
//! borrow checker rules out the use-after-free/double-init bugs the source
//! guarded against with `valid` sentinels.

mod atomic;
mod barrier;
mod condvar;
mod mutex;
mod rwlock;
mod thread;

pub use atomic::AtomicCounter;
pub use barrier::{Barrier, BarrierWaitResult};
pub use condvar::{Condvar, WaitResult};
pub use mutex::{LockStatus, Mutex, MutexGuard};
pub use rwlock::{RwLock, RwLockReadGuard, RwLockWriteGuard};
pub use thread::{SchedPolicy, ThreadHandle};

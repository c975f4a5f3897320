//! Condition variable, bound to a [`super::mutex::Mutex`]-held guard at each
//! call site, matching the source's "bound to a mutex at initialization"
//! contract (`spec.md` §4.1) without requiring a back-pointer: the caller
//! supplies the guard it already holds, same as passing `&mutex` to
//! `pthread_cond_wait`.

use std::sync::MutexGuard;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    /// Woken by `signal`/`broadcast` (or a spurious wake-up — callers must
    /// recheck their predicate regardless).
    Signalled,
    /// The timeout elapsed before a wake-up was observed.
    TimedOut,
}

pub struct Condvar {
    inner: std::sync::Condvar,
}

impl Condvar {
    pub fn new() -> Self {
        Condvar {
            inner: std::sync::Condvar::new(),
        }
    }

    /// Waits on `guard` until woken or `timeout_micros` elapses. `0` means
    /// "don't block" (per `spec.md` §8: `popWait(0)` times out immediately).
    pub fn wait_timeout<'a, T>(
        &self,
        guard: MutexGuard<'a, T>,
        timeout_micros: u64,
    ) -> (MutexGuard<'a, T>, WaitResult) {
        let timeout = Duration::from_micros(timeout_micros);
        match self.inner.wait_timeout(guard, timeout) {
            Ok((guard, result)) => {
                if result.timed_out() {
                    (guard, WaitResult::TimedOut)
                } else {
                    (guard, WaitResult::Signalled)
                }
            }
            Err(poisoned) => {
                let (guard, result) = poisoned.into_inner();
                tracing::warn!("condvar mutex previous owner died, recovering as consistent");
                if result.timed_out() {
                    (guard, WaitResult::TimedOut)
                } else {
                    (guard, WaitResult::Signalled)
                }
            }
        }
    }

    /// Blocks with no timeout, matching `pthread_cond_wait` — used by
    /// [`super::barrier::Barrier`], which has no timeout concept of its own.
    pub fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
        match self.inner.wait(guard) {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("condvar mutex previous owner died, recovering as consistent");
                poisoned.into_inner()
            }
        }
    }

    /// Wakes one waiter.
    pub fn signal(&self) {
        self.inner.notify_one();
    }

    /// Wakes every waiter.
    pub fn broadcast(&self) {
        self.inner.notify_all();
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::Mutex;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn timeout_elapses_on_empty_predicate() {
        let mutex = Mutex::new(false);
        let cv = Condvar::new();
        let (guard, _) = mutex.lock();
        let (_, result) = cv.wait_timeout(guard, 1_000);
        assert_eq!(result, WaitResult::TimedOut);
    }

    #[test]
    fn signal_wakes_waiter() {
        let mutex = Arc::new(Mutex::new(false));
        let cv = Arc::new(Condvar::new());

        let m2 = Arc::clone(&mutex);
        let cv2 = Arc::clone(&cv);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            let (mut guard, _) = m2.lock();
            *guard = true;
            cv2.signal();
        });

        let (mut guard, _) = mutex.lock();
        while !*guard {
            let (g, _) = cv.wait_timeout(guard, 1_000_000);
            guard = g;
        }
        assert!(*guard);
        handle.join().unwrap();
    }
}

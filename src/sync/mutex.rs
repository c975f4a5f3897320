//! A thin wrapper over `std::sync::Mutex` with robust-mutex semantics.
//!
//! The source's `Mutex` is a pthread mutex constructed with the
//! `PTHREAD_MUTEX_ROBUST` attribute: if the previous owner dies while
//! holding the lock, the next locker observes `EOWNERDEAD`, takes the lock
//! anyway, and calls `pthread_mutex_consistent` to mark it sane again.
//! `std::sync::Mutex` poisons instead of EOWNERDEAD-ing, but the shape of
//! the recovery is the same: the next locker gets the data and decides it's
//! still usable. `lock`/`try_lock` here recover from poisoning rather than
//! propagating a panic, and report that recovery through [`LockStatus`].

use std::sync::{self, MutexGuard as StdMutexGuard, TryLockError};

/// Status returned by lock operations. `0` (`Ok`) signals success, matching
/// the source's "small integer status, `0` means success" convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    /// Lock acquired cleanly.
    Ok,
    /// Lock acquired, but the previous owner panicked while holding it; the
    /// mutex has been marked consistent again (the robust-mutex recovery
    /// path).
    Recovered,
    /// Lock not acquired (only returned by `try_lock`).
    WouldBlock,
}

impl LockStatus {
    pub fn is_ok(self) -> bool {
        matches!(self, LockStatus::Ok | LockStatus::Recovered)
    }
}

/// A mutex guarding a `T`, robust against a poisoned inner lock.
///
/// `shared` mirrors the source's construction-time choice of
/// `PTHREAD_PROCESS_SHARED` vs `PTHREAD_PROCESS_PRIVATE`; this crate has no
/// cross-process shared memory (out of scope, see `spec.md` §1), so the
/// flag is recorded but does not change behavior.
pub struct Mutex<T> {
    inner: sync::Mutex<T>,
    shared: bool,
}

pub type MutexGuard<'a, T> = StdMutexGuard<'a, T>;

impl<T> Mutex<T> {
    pub fn new(value: T) -> Self {
        Self::with_sharing(value, false)
    }

    pub fn with_sharing(value: T, shared: bool) -> Self {
        Mutex {
            inner: sync::Mutex::new(value),
            shared,
        }
    }

    pub fn is_shared(&self) -> bool {
        self.shared
    }

    pub fn lock(&self) -> (MutexGuard<'_, T>, LockStatus) {
        match self.inner.lock() {
            Ok(guard) => (guard, LockStatus::Ok),
            Err(poisoned) => {
                tracing::warn!("mutex previous owner died, recovering as consistent");
                (poisoned.into_inner(), LockStatus::Recovered)
            }
        }
    }

    pub fn try_lock(&self) -> Option<(MutexGuard<'_, T>, LockStatus)> {
        match self.inner.try_lock() {
            Ok(guard) => Some((guard, LockStatus::Ok)),
            Err(TryLockError::Poisoned(poisoned)) => {
                tracing::warn!("mutex previous owner died, recovering as consistent");
                Some((poisoned.into_inner(), LockStatus::Recovered))
            }
            Err(TryLockError::WouldBlock) => None,
        }
    }
}

/// `unlock` in the source is an explicit pthread call; Rust's guard `Drop`
/// is the idiomatic equivalent, so there is no method here — dropping the
/// guard returned by `lock`/`try_lock` releases the mutex.
///
/// `std::sync::Mutex` has no try-lock-with-timeout primitive; callers
/// needing a timed lock should pair a [`super::condvar::Condvar`] with a
/// guarded predicate instead (see `PQueue::pop_wait`).

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn lock_then_try_lock_fails() {
        let m = Mutex::new(5);
        let (guard, status) = m.lock();
        assert_eq!(status, LockStatus::Ok);
        assert!(m.try_lock().is_none());
        drop(guard);
        assert!(m.try_lock().is_some());
    }

    #[test]
    fn recovers_from_poisoning() {
        let m = Arc::new(Mutex::new(0));
        let m2 = Arc::clone(&m);
        let handle = thread::spawn(move || {
            let (mut guard, _) = m2.lock();
            *guard = 42;
            panic!("simulated worker crash while holding the lock");
        });
        let _ = handle.join();

        let (guard, status) = m.lock();
        assert_eq!(status, LockStatus::Recovered);
        assert_eq!(*guard, 42);
    }

    #[test]
    fn mutates_through_guard() {
        let m = Mutex::new(vec![1, 2, 3]);
        {
            let (mut guard, _) = m.lock();
            guard.push(4);
        }
        let (guard, _) = m.lock();
        assert_eq!(*guard, vec![1, 2, 3, 4]);
    }
}

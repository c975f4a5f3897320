//! A thin wrapper over `std::sync::RwLock`, poison-recovering like
//! [`super::mutex::Mutex`].
//!
//! Writer preference is unspecified, matching `spec.md` §4.1: callers must
//! not rely on starvation bounds (`std::sync::RwLock`'s policy is platform
//! dependent, which is exactly the "unspecified" the source's pthread
//! rwlock already was).

use std::sync::{self, RwLockReadGuard as StdReadGuard, RwLockWriteGuard as StdWriteGuard};

use super::mutex::LockStatus;

pub type RwLockReadGuard<'a, T> = StdReadGuard<'a, T>;
pub type RwLockWriteGuard<'a, T> = StdWriteGuard<'a, T>;

pub struct RwLock<T> {
    inner: sync::RwLock<T>,
}

impl<T> RwLock<T> {
    pub fn new(value: T) -> Self {
        RwLock {
            inner: sync::RwLock::new(value),
        }
    }

    pub fn read(&self) -> (RwLockReadGuard<'_, T>, LockStatus) {
        match self.inner.read() {
            Ok(guard) => (guard, LockStatus::Ok),
            Err(poisoned) => {
                tracing::warn!("rwlock previous owner died, recovering as consistent");
                (poisoned.into_inner(), LockStatus::Recovered)
            }
        }
    }

    pub fn try_read(&self) -> Option<(RwLockReadGuard<'_, T>, LockStatus)> {
        match self.inner.try_read() {
            Ok(guard) => Some((guard, LockStatus::Ok)),
            Err(sync::TryLockError::Poisoned(poisoned)) => {
                Some((poisoned.into_inner(), LockStatus::Recovered))
            }
            Err(sync::TryLockError::WouldBlock) => None,
        }
    }

    pub fn write(&self) -> (RwLockWriteGuard<'_, T>, LockStatus) {
        match self.inner.write() {
            Ok(guard) => (guard, LockStatus::Ok),
            Err(poisoned) => {
                tracing::warn!("rwlock previous owner died, recovering as consistent");
                (poisoned.into_inner(), LockStatus::Recovered)
            }
        }
    }

    pub fn try_write(&self) -> Option<(RwLockWriteGuard<'_, T>, LockStatus)> {
        match self.inner.try_write() {
            Ok(guard) => Some((guard, LockStatus::Ok)),
            Err(sync::TryLockError::Poisoned(poisoned)) => {
                Some((poisoned.into_inner(), LockStatus::Recovered))
            }
            Err(sync::TryLockError::WouldBlock) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrent_readers_allowed() {
        let lock = RwLock::new(10);
        let (r1, _) = lock.read();
        let (r2, _) = lock.try_read().expect("second reader should not block");
        assert_eq!(*r1, 10);
        assert_eq!(*r2, 10);
        drop((r1, r2));

        let (mut w, status) = lock.write();
        assert_eq!(status, LockStatus::Ok);
        *w = 11;
        drop(w);

        let (r, _) = lock.read();
        assert_eq!(*r, 11);
    }

    #[test]
    fn writer_excludes_readers() {
        let lock = RwLock::new(0);
        let (_w, _) = lock.write();
        assert!(lock.try_read().is_none());
    }
}

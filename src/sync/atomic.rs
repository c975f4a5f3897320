//! Sequentially-consistent atomic counter, the Rust shape of the source's
//! `Atomic_get`/`Atomic_set`/`Atomic_inc`/`Atomic_dec`/
//! `Atomic_testAndSetValue` (used directly by [`super::barrier::Barrier`]'s
//! `gone` counter).

use std::sync::atomic::{AtomicI64, Ordering};

pub struct AtomicCounter {
    value: AtomicI64,
}

impl AtomicCounter {
    pub fn new(initial: i64) -> Self {
        AtomicCounter {
            value: AtomicI64::new(initial),
        }
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }

    pub fn set(&self, new_value: i64) {
        self.value.store(new_value, Ordering::SeqCst);
    }

    pub fn inc(&self) -> i64 {
        self.value.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn dec(&self) -> i64 {
        self.value.fetch_sub(1, Ordering::SeqCst) - 1
    }

    /// Atomically sets the counter to `new` if it currently equals
    /// `current`; returns whether the swap happened.
    pub fn test_and_set_value(&self, current: i64, new: i64) -> bool {
        self.value
            .compare_exchange(current, new, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

impl Default for AtomicCounter {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inc_dec_roundtrip() {
        let c = AtomicCounter::new(0);
        assert_eq!(c.inc(), 1);
        assert_eq!(c.inc(), 2);
        assert_eq!(c.dec(), 1);
        assert_eq!(c.get(), 1);
    }

    #[test]
    fn test_and_set_value_only_on_match() {
        let c = AtomicCounter::new(5);
        assert!(!c.test_and_set_value(4, 10));
        assert_eq!(c.get(), 5);
        assert!(c.test_and_set_value(5, 10));
        assert_eq!(c.get(), 10);
    }
}

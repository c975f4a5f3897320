//! Reusable barrier with arrival count and optional trip callback, per
//! `spec.md` §4.1 and grounded on `original_source/Barrier.c`'s
//! `required`/`arrived`/`gone` state machine.
//!
//! Unlike the source, the trip callback is an owned `FnMut()` closure held
//! directly by the barrier — `spec.md` §9 notes the source's callback
//! state often points back at the barrier itself; an owned closure gives
//! both directions without a back-pointer.

use super::condvar::Condvar;
use super::mutex::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierWaitResult {
    /// This thread brought the arrival count to `required`; it ran the trip
    /// function (if any) before the other waiters were released.
    Tripped,
    /// This thread was released by another thread's trip.
    Arrived,
}

struct State {
    required: u64,
    arrived: u64,
    gone: u64,
}

pub struct Barrier {
    state: Mutex<State>,
    cond: Condvar,
    trip: Mutex<Option<Box<dyn FnMut() + Send>>>,
}

impl Barrier {
    /// `required` must be greater than zero.
    pub fn new(required: u64) -> Self {
        Self::with_trip(required, None)
    }

    pub fn with_trip(required: u64, trip: Option<Box<dyn FnMut() + Send>>) -> Self {
        debug_assert!(required > 0, "Barrier requires a positive waiter count");
        Barrier {
            state: Mutex::new(State {
                required,
                arrived: 0,
                gone: 0,
            }),
            cond: Condvar::new(),
            trip: Mutex::new(trip),
        }
    }

    /// Blocks until `required` waiters have called `wait`. The thread that
    /// completes the count runs the trip function (if any), then
    /// broadcasts; all other waiters return once released.
    pub fn wait(&self) -> BarrierWaitResult {
        let (mut guard, _) = self.state.lock();
        guard.arrived += 1;

        if guard.arrived >= guard.required {
            guard.gone = 1;

            // Run the trip closure with the barrier's internal lock
            // released, mirroring the source calling the callback while
            // still holding its own mutex but before unlocking — here we
            // drop the state lock first so a trip function that itself
            // calls `wait` (a reentrant barrier reuse) cannot deadlock.
            drop(guard);
            if let (mut trip_guard, _) = self.trip.lock() {
                if let Some(trip) = trip_guard.as_mut() {
                    trip();
                }
            }
            let (mut guard, _) = self.state.lock();
            guard.arrived = 0;
            self.cond.broadcast();
            drop(guard);

            BarrierWaitResult::Tripped
        } else {
            let required = guard.required;
            let mut guard = self.cond.wait(guard);
            guard.gone += 1;
            if guard.gone >= required {
                guard.gone = 0;
            }
            BarrierWaitResult::Arrived
        }
    }

    /// True once every waiter from the last trip has left (or before the
    /// first trip has ever happened).
    pub fn is_empty(&self) -> bool {
        let (guard, _) = self.state.lock();
        guard.gone == 0 || guard.gone >= guard.required
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn exactly_one_thread_trips() {
        const N: usize = 8;
        let barrier = Arc::new(Barrier::new(N as u64));
        let trip_count = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..N)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let trip_count = Arc::clone(&trip_count);
                thread::spawn(move || {
                    let result = barrier.wait();
                    if result == BarrierWaitResult::Tripped {
                        trip_count.fetch_add(1, Ordering::SeqCst);
                    }
                    result
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(trip_count.load(Ordering::SeqCst), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| **r == BarrierWaitResult::Arrived)
                .count(),
            N - 1
        );
    }

    #[test]
    fn trip_function_runs_once_per_round() {
        let ran = Arc::new(AtomicUsize::new(0));
        let ran2 = Arc::clone(&ran);
        let barrier = Arc::new(Barrier::with_trip(
            2,
            Some(Box::new(move || {
                ran2.fetch_add(1, Ordering::SeqCst);
            })),
        ));

        let b2 = Arc::clone(&barrier);
        let h = thread::spawn(move || b2.wait());
        barrier.wait();
        h.join().unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);

        // Reuse: the barrier trips again after all waiters left.
        let b3 = Arc::clone(&barrier);
        let h = thread::spawn(move || b3.wait());
        barrier.wait();
        h.join().unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 2);
    }
}

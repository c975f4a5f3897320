//! `PQueue`/`PQueueArray` — a bounded FIFO of arbitrary serializable
//! values backed by a fixed-size slot arena, per `spec.md` §4.4.
//!
//! The source's single contiguous `elementMemory` arena sliced by offset
//! collapses here into a `Vec` of independently-owned, independently-
//! locked slots (`Vec<sync::Mutex<Option<Vec<u8>>>>`): each slot is either
//! free (`None`) or owns one serialized element's bytes, which is exactly
//! `spec.md` §3's slot invariant, just expressed without the raw pointer
//! arithmetic the C arena needed. `setup_element` still measures a
//! sample's serialized size via [`crate::serialize::calc_size_of`] and
//! records it, but slots are no longer bound to that size in advance —
//! see `DESIGN.md` for the rationale.

mod error;

pub use error::{PQueueError, PQueueResult};

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::channel::backends::mem::MemBufferChannel;
use crate::channel::AccessMode;
use crate::serialize::format::binary::BinaryFormat;
use crate::serialize::{calc_size_of, Direction, Serializable, Serialize};
use crate::sync;

fn serialize_to_bytes<T: Serializable>(value: &mut T) -> PQueueResult<Vec<u8>> {
    let mut channel = MemBufferChannel::new(AccessMode::WRITE);
    {
        let mut s = Serialize::new(&mut channel, Box::new(BinaryFormat::new()), Direction::Write);
        value
            .serialize("element", &mut s)
            .map_err(PQueueError::StoreDataFailed)?;
    }
    Ok(channel.into_inner())
}

fn deserialize_from_bytes<T: Serializable>(value: &mut T, bytes: Vec<u8>) -> PQueueResult<()> {
    let mut channel = MemBufferChannel::from_bytes(bytes, AccessMode::READ);
    let mut s = Serialize::new(&mut channel, Box::new(BinaryFormat::new()), Direction::Read);
    value
        .serialize("element", &mut s)
        .map_err(PQueueError::RetrieveDataFailed)
}

/// A bounded FIFO of `T`, per `spec.md` §4.4. `T::default()` plus
/// `T::serialize` stands in for the source's `<TypeName>_indirectSerialize`
/// dynamic-loader lookup (`spec.md` §9's "naming-convention dynamic
/// dispatch" resolved at compile time instead of load time).
pub struct PQueue<T: Serializable + Default + Send> {
    max_length: usize,
    max_element_size: AtomicUsize,
    slots: Vec<sync::Mutex<Option<Vec<u8>>>>,
    head: AtomicUsize,
    tail: AtomicUsize,
    num_elements: sync::AtomicCounter,
    push_mutex: sync::Mutex<()>,
    pop_mutex: sync::Mutex<()>,
    push_condvar: sync::Condvar,
    condvar_mutex: sync::Mutex<()>,
    quit: AtomicBool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Serializable + Default + Send> PQueue<T> {
    pub fn new(max_length: usize) -> PQueueResult<Self> {
        if max_length == 0 {
            return Err(PQueueError::AllocFailed);
        }
        Ok(PQueue {
            max_length,
            max_element_size: AtomicUsize::new(0),
            slots: (0..max_length).map(|_| sync::Mutex::new(None)).collect(),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            num_elements: sync::AtomicCounter::new(0),
            push_mutex: sync::Mutex::new(()),
            pop_mutex: sync::Mutex::new(()),
            push_condvar: sync::Condvar::new(),
            condvar_mutex: sync::Mutex::new(()),
            quit: AtomicBool::new(false),
            _marker: PhantomData,
        })
    }

    /// Learns `sample`'s maximum serialized size via the calc-size channel
    /// (`spec.md` §4.4's initialization protocol, step 3). Advisory only —
    /// unlike the source's fixed-size arena, a slot here is a growable
    /// `Vec<u8>`, so this is recorded for callers that want to bound
    /// element size themselves, not enforced on every push.
    pub fn setup_element(&self, sample: &mut T) -> PQueueResult<()> {
        let size = calc_size_of(sample, "element").map_err(PQueueError::StoreDataFailed)?;
        self.max_element_size.store(size as usize, Ordering::SeqCst);
        Ok(())
    }

    pub fn max_element_size(&self) -> usize {
        self.max_element_size.load(Ordering::SeqCst)
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn len(&self) -> usize {
        self.num_elements.get().max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.max_length
    }

    /// Releases every blocked `pop_wait`/`purge_wait` caller; subsequent
    /// calls observe `quit` and return `queueEmpty` rather than blocking,
    /// per `spec.md` §5's cancellation model.
    pub fn set_quit(&self, quit: bool) {
        self.quit.store(quit, Ordering::SeqCst);
    }

    pub fn wake_up_all(&self) {
        self.push_condvar.broadcast();
    }

    /// Multi-producer push, per `spec.md` §4.4. Exactly one producer is
    /// in flight at a time (`push_mutex`); `queueFull` leaves every slot
    /// untouched.
    pub fn push(&self, value: &mut T) -> PQueueResult<()> {
        let (_guard, _status) = self.push_mutex.lock();
        if self.len() >= self.max_length {
            return Err(PQueueError::QueueFull);
        }

        let bytes = serialize_to_bytes(value)?;
        let tail = self.tail.load(Ordering::SeqCst);
        {
            let (mut slot, _status) = self.slots[tail].lock();
            if slot.is_some() {
                return Err(PQueueError::StoreDataFailed(
                    crate::serialize::SerializeError::UnexpectedPrimitive,
                ));
            }
            *slot = Some(bytes);
        }
        self.tail.store((tail + 1) % self.max_length, Ordering::SeqCst);
        self.num_elements.inc();
        self.push_condvar.signal();
        Ok(())
    }

    /// Non-blocking multi-consumer pop into a caller-owned target, per
    /// `spec.md` §4.4.
    pub fn pop_into(&self, out: &mut T) -> PQueueResult<()> {
        let (_guard, _status) = self.pop_mutex.lock();
        self.try_pop_locked(out)
    }

    /// Convenience form returning a freshly defaulted `T`.
    pub fn pop(&self) -> PQueueResult<T> {
        let mut value = T::default();
        self.pop_into(&mut value)?;
        Ok(value)
    }

    fn try_pop_locked(&self, out: &mut T) -> PQueueResult<()> {
        if self.len() == 0 {
            return Err(PQueueError::QueueEmpty);
        }
        let head = self.head.load(Ordering::SeqCst);
        let bytes = {
            let (mut slot, _status) = self.slots[head].lock();
            slot.take().ok_or(PQueueError::RetrieveDataFailed(
                crate::serialize::SerializeError::UnexpectedPrimitive,
            ))?
        };
        deserialize_from_bytes(out, bytes)?;
        self.head.store((head + 1) % self.max_length, Ordering::SeqCst);
        self.num_elements.dec();
        Ok(())
    }

    /// Blocks up to `timeout_micros` for an element if the queue is empty,
    /// per `spec.md` §4.4's `PopWait`. `0` times out immediately
    /// (`spec.md` §8: `popWait(0)` on an empty queue times out rather than
    /// blocking even briefly).
    pub fn pop_wait_into(&self, out: &mut T, timeout_micros: u64) -> PQueueResult<()> {
        let (_pop_guard, _status) = self.pop_mutex.lock();

        if timeout_micros == 0 {
            return self.try_pop_locked(out).map_err(|e| match e {
                PQueueError::QueueEmpty => PQueueError::Timeout,
                other => other,
            });
        }

        let deadline = Instant::now() + Duration::from_micros(timeout_micros);
        loop {
            match self.try_pop_locked(out) {
                Ok(()) => return Ok(()),
                Err(PQueueError::QueueEmpty) => {
                    if self.quit.load(Ordering::SeqCst) {
                        return Err(PQueueError::QueueEmpty);
                    }
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(PQueueError::Timeout);
                    }
                    let remaining = (deadline - now).as_micros().min(u128::from(u64::MAX)) as u64;
                    let (cv_guard, _cv_status) = self.condvar_mutex.lock();
                    let (_cv_guard, _wait_result) = self.push_condvar.wait_timeout(cv_guard, remaining);
                    if self.quit.load(Ordering::SeqCst) {
                        return Err(PQueueError::QueueEmpty);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn pop_wait(&self, timeout_micros: u64) -> PQueueResult<T> {
        let mut value = T::default();
        self.pop_wait_into(&mut value, timeout_micros)?;
        Ok(value)
    }

    /// Drains every element currently available, without blocking for
    /// more. Atomic with respect to other `pop`/`purge` callers
    /// (`pop_mutex` held throughout); pushes may interleave.
    pub fn purge(&self, out: &mut Vec<T>) -> usize {
        let (_guard, _status) = self.pop_mutex.lock();
        let mut drained = 0;
        loop {
            let mut value = T::default();
            match self.try_pop_locked(&mut value) {
                Ok(()) => {
                    out.push(value);
                    drained += 1;
                }
                Err(_) => break,
            }
        }
        drained
    }

    /// Waits up to `timeout_micros` for at least one element, then drains
    /// everything else already available without blocking further.
    pub fn purge_wait(&self, timeout_micros: u64, out: &mut Vec<T>) -> usize {
        let mut first = T::default();
        match self.pop_wait_into(&mut first, timeout_micros) {
            Ok(()) => {
                out.push(first);
                1 + self.purge(out)
            }
            Err(_) => 0,
        }
    }
}

/// A fan-out of `N` independent [`PQueue`]s keyed by index, for higher
/// producer/consumer concurrency than a single queue's one-in-flight-
/// producer/one-in-flight-consumer pairing allows (`spec.md` §4.4: "for
/// higher fan-out, use `PQueueArray`").
pub struct PQueueArray<T: Serializable + Default + Send> {
    queues: Vec<PQueue<T>>,
}

impl<T: Serializable + Default + Send> PQueueArray<T> {
    pub fn new(shard_count: usize, max_length: usize) -> PQueueResult<Self> {
        if shard_count == 0 {
            return Err(PQueueError::AllocFailed);
        }
        let queues = (0..shard_count)
            .map(|_| PQueue::new(max_length))
            .collect::<PQueueResult<Vec<_>>>()?;
        Ok(PQueueArray { queues })
    }

    pub fn shard_count(&self) -> usize {
        self.queues.len()
    }

    fn shard(&self, key: usize) -> &PQueue<T> {
        &self.queues[key % self.queues.len()]
    }

    /// Learns the sample's size once and copies it to every shard, since
    /// every shard holds the same element type.
    pub fn setup_element(&self, sample: &mut T) -> PQueueResult<()> {
        if let Some(first) = self.queues.first() {
            first.setup_element(sample)?;
            let size = first.max_element_size();
            for queue in &self.queues[1..] {
                queue.max_element_size.store(size, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    pub fn push(&self, key: usize, value: &mut T) -> PQueueResult<()> {
        self.shard(key).push(value)
    }

    pub fn pop_into(&self, key: usize, out: &mut T) -> PQueueResult<()> {
        self.shard(key).pop_into(out)
    }

    pub fn pop(&self, key: usize) -> PQueueResult<T> {
        self.shard(key).pop()
    }

    pub fn pop_wait_into(&self, key: usize, out: &mut T, timeout_micros: u64) -> PQueueResult<()> {
        self.shard(key).pop_wait_into(out, timeout_micros)
    }

    pub fn pop_wait(&self, key: usize, timeout_micros: u64) -> PQueueResult<T> {
        self.shard(key).pop_wait(timeout_micros)
    }

    pub fn set_quit(&self, quit: bool) {
        for queue in &self.queues {
            queue.set_quit(quit);
        }
    }

    pub fn wake_up_all(&self) {
        for queue in &self.queues {
            queue.wake_up_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::SerializeResult;

    #[derive(Debug, Default, Clone, PartialEq, Eq)]
    struct Blob {
        bytes: Vec<u8>,
    }

    impl Serializable for Blob {
        fn serialize(&mut self, name: &str, s: &mut Serialize<'_>) -> SerializeResult<()> {
            s.begin_type(name, "Blob")?;
            let mut len = self.bytes.len() as u32;
            s.uint("len", &mut len)?;
            if s.is_read() {
                self.bytes = vec![0u8; len as usize];
            }
            s.char_array("bytes", &mut self.bytes)?;
            s.end_type(name)
        }
    }

    fn blob(n: u8, len: usize) -> Blob {
        Blob {
            bytes: vec![n; len],
        }
    }

    #[test]
    fn push_three_then_pop_in_fifo_order() {
        let queue: PQueue<Blob> = PQueue::new(4).unwrap();
        let mut sample = blob(0, 10);
        queue.setup_element(&mut sample).unwrap();

        queue.push(&mut blob(1, 10)).unwrap();
        queue.push(&mut blob(2, 10)).unwrap();
        queue.push(&mut blob(3, 10)).unwrap();
        assert_eq!(queue.len(), 3);

        assert_eq!(queue.pop().unwrap(), blob(1, 10));
        assert_eq!(queue.pop().unwrap(), blob(2, 10));
        assert_eq!(queue.pop().unwrap(), blob(3, 10));
        assert!(queue.is_empty());
    }

    #[test]
    fn push_into_full_queue_is_rejected_without_touching_slots() {
        let queue: PQueue<Blob> = PQueue::new(2).unwrap();
        queue.push(&mut blob(1, 4)).unwrap();
        queue.push(&mut blob(2, 4)).unwrap();
        let err = queue.push(&mut blob(3, 4)).unwrap_err();
        assert!(matches!(err, PQueueError::QueueFull));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn pop_from_empty_queue_is_queue_empty() {
        let queue: PQueue<Blob> = PQueue::new(2).unwrap();
        let err = queue.pop().unwrap_err();
        assert!(matches!(err, PQueueError::QueueEmpty));
    }

    #[test]
    fn pop_wait_zero_times_out_immediately() {
        let queue: PQueue<Blob> = PQueue::new(2).unwrap();
        let err = queue.pop_wait(0).unwrap_err();
        assert!(matches!(err, PQueueError::Timeout));
    }

    #[test]
    fn purge_drains_everything_available() {
        let queue: PQueue<Blob> = PQueue::new(4).unwrap();
        queue.push(&mut blob(1, 2)).unwrap();
        queue.push(&mut blob(2, 2)).unwrap();
        let mut drained = Vec::new();
        let n = queue.purge(&mut drained);
        assert_eq!(n, 2);
        assert_eq!(drained.len(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn pqueue_array_shards_by_index() {
        let array: PQueueArray<Blob> = PQueueArray::new(3, 4).unwrap();
        array.push(0, &mut blob(1, 2)).unwrap();
        array.push(3, &mut blob(2, 2)).unwrap(); // 3 % 3 == 0, same shard as key 0
        assert_eq!(array.pop(0).unwrap(), blob(1, 2));
        assert_eq!(array.pop(0).unwrap(), blob(2, 2));
    }

    #[test]
    fn concurrent_push_and_pop_preserve_fifo_and_count() {
        use std::sync::Arc;
        use std::thread;

        let queue: Arc<PQueue<Blob>> = Arc::new(PQueue::new(16).unwrap());
        let producer_queue = Arc::clone(&queue);
        let producer = thread::spawn(move || {
            for i in 0..50u8 {
                loop {
                    if producer_queue.push(&mut blob(i, 8)).is_ok() {
                        break;
                    }
                    thread::yield_now();
                }
            }
        });

        let mut received = Vec::new();
        while received.len() < 50 {
            match queue.pop_wait(10_000) {
                Ok(value) => received.push(value),
                Err(_) => continue,
            }
        }
        producer.join().unwrap();

        for (i, value) in received.iter().enumerate() {
            assert_eq!(*value, blob(i as u8, 8));
        }
    }
}

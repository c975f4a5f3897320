//! `WorkQueue` — a minimum/maximum-sized worker pool executing
//! `WorkQueueTask`s in FIFO order, per `spec.md` §4.5. Grounded on
//! `original_source/WorkQueue.h`: `WorkQueueTaskFn`/`WorkQueueTaskCallback`
//! collapse into owned closures (the void-pointer `instance`/`userData`
//! pair becomes whatever the closure captures), and the pooled
//! `getTask`/`disposeTask` lifecycle collapses into `Arc`+`Drop` — once a
//! caller drops its `WorkQueueTask` handle there is nothing left to
//! dispose of.

mod error;

pub use error::{WorkQueueError, WorkQueueResult};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::sync::{self, AtomicCounter};

/// How long an idle worker blocks on the task queue before re-checking
/// whether it is surplus to `minWorkers` (`spec.md` §4.5's scheduling
/// note).
const IDLE_POLL: Duration = Duration::from_millis(100);

/// The two outcomes a task function can report, per
/// `original_source/WorkQueue.h`'s `WorkQueueTaskStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkQueueTaskStatus {
    Success,
    Failure,
}

type TaskFn = Box<dyn FnOnce() -> WorkQueueTaskStatus + Send>;
type TaskCallback = Box<dyn FnOnce(WorkQueueTaskStatus) + Send>;

struct TaskState {
    status: sync::Mutex<Option<WorkQueueTaskStatus>>,
    condvar: sync::Condvar,
}

/// A handle to one enqueued unit of work, per `spec.md` §3's
/// `WorkQueueTask` (`completionFlag`/`completionCondVar`/`completionMutex`
/// collapsed into [`TaskState`]). Cloning shares the same completion gate;
/// dropping the last handle simply drops the `Arc` — there is no separate
/// `disposeTask` step to call.
#[derive(Clone)]
pub struct WorkQueueTask {
    state: Arc<TaskState>,
}

impl WorkQueueTask {
    fn new() -> (Self, Arc<TaskState>) {
        let state = Arc::new(TaskState {
            status: sync::Mutex::new(None),
            condvar: sync::Condvar::new(),
        });
        (
            WorkQueueTask {
                state: Arc::clone(&state),
            },
            state,
        )
    }

    /// Non-blocking peek at whatever status has been recorded so far.
    pub fn status(&self) -> Option<WorkQueueTaskStatus> {
        let (guard, _) = self.state.status.lock();
        *guard
    }

    /// Blocks until the task's `taskFn` has run and its status has been
    /// recorded, per `spec.md` §8: "`WorkQueueTask_wait` returns only
    /// after the task's status has been set."
    pub fn wait(&self) -> WorkQueueTaskStatus {
        let (mut guard, _) = self.state.status.lock();
        while guard.is_none() {
            guard = self.state.condvar.wait(guard);
        }
        guard.expect("loop only exits once status is Some")
    }

    /// Like [`Self::wait`] but gives up after `timeout_micros` and returns
    /// `None` rather than blocking indefinitely.
    pub fn wait_timeout(&self, timeout_micros: u64) -> Option<WorkQueueTaskStatus> {
        let (mut guard, _) = self.state.status.lock();
        loop {
            if let Some(status) = *guard {
                return Some(status);
            }
            let (next_guard, result) = self.state.condvar.wait_timeout(guard, timeout_micros);
            guard = next_guard;
            if guard.is_none() && result == sync::WaitResult::TimedOut {
                return None;
            }
        }
    }
}

enum Job {
    Run {
        state: Arc<TaskState>,
        task_fn: TaskFn,
        callback: Option<TaskCallback>,
    },
    Shutdown,
}

/// A `minWorkers..=maxWorkers` thread pool, per `spec.md` §4.5.
pub struct WorkQueue {
    sender: Sender<Job>,
    receiver: Receiver<Job>,
    workers: sync::Mutex<Vec<JoinHandle<()>>>,
    live_workers: Arc<AtomicCounter>,
    min_workers: usize,
    max_workers: usize,
    shutdown: Arc<AtomicBool>,
}

impl WorkQueue {
    /// Starts `min_workers` workers immediately; more are admitted up to
    /// `max_workers` as sustained queue depth is observed on `enqueue`,
    /// per §4.5's "admission of new workers... happens when enqueue
    /// observes sustained queue depth".
    pub fn new(min_workers: usize, max_workers: usize) -> WorkQueueResult<Self> {
        if min_workers == 0 || min_workers > max_workers {
            return Err(WorkQueueError::InvalidPoolSize);
        }
        let (sender, receiver) = crossbeam_channel::unbounded();
        let live_workers = Arc::new(AtomicCounter::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(max_workers);
        for _ in 0..min_workers {
            workers.push(spawn_worker(
                receiver.clone(),
                Arc::clone(&live_workers),
                min_workers,
                Arc::clone(&shutdown),
            ));
        }

        Ok(WorkQueue {
            sender,
            receiver,
            workers: sync::Mutex::new(workers),
            live_workers,
            min_workers,
            max_workers,
            shutdown,
        })
    }

    pub fn min_workers(&self) -> usize {
        self.min_workers
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Currently-live worker threads, including ones past their idle
    /// timeout that have not yet observed it.
    pub fn live_workers(&self) -> usize {
        self.live_workers.get().max(0) as usize
    }

    /// Hands `task_fn` to the pool; exactly one worker runs it and records
    /// its [`WorkQueueTaskStatus`], per §4.5's task lifecycle. `callback`,
    /// if given, runs on the worker thread immediately afterward.
    pub fn enqueue<F, C>(&self, task_fn: F, callback: Option<C>) -> WorkQueueResult<WorkQueueTask>
    where
        F: FnOnce() -> WorkQueueTaskStatus + Send + 'static,
        C: FnOnce(WorkQueueTaskStatus) + Send + 'static,
    {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(WorkQueueError::ShuttingDown);
        }

        let (handle, state) = WorkQueueTask::new();
        let job = Job::Run {
            state,
            task_fn: Box::new(task_fn),
            callback: callback.map(|c| Box::new(c) as TaskCallback),
        };
        self.sender.send(job).map_err(|_| WorkQueueError::ShuttingDown)?;
        self.maybe_grow_pool();
        Ok(handle)
    }

    fn maybe_grow_pool(&self) {
        if self.receiver.len() == 0 {
            return;
        }
        if self.live_workers() >= self.max_workers {
            return;
        }
        let (mut workers, _status) = self.workers.lock();
        if self.live_workers() >= self.max_workers {
            return;
        }
        workers.push(spawn_worker(
            self.receiver.clone(),
            Arc::clone(&self.live_workers),
            self.min_workers,
            Arc::clone(&self.shutdown),
        ));
    }

    /// Sets the shutdown flag, wakes every worker (idle or blocked), and
    /// joins them all before returning, per §4.5's cancellation contract
    /// and `spec.md` §5: "a task currently executing runs to completion."
    /// Idempotent — calling it twice is a no-op the second time.
    pub fn shutdown(&self) -> WorkQueueResult<()> {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        for _ in 0..self.max_workers {
            let _ = self.sender.send(Job::Shutdown);
        }
        let (mut workers, _status) = self.workers.lock();
        for handle in workers.drain(..) {
            handle
                .join()
                .map_err(|_| WorkQueueError::JoinFailed("worker thread panicked".into()))?;
        }
        Ok(())
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!(error = %e, "error joining workers during WorkQueue drop");
        }
    }
}

fn spawn_worker(
    receiver: Receiver<Job>,
    live_workers: Arc<AtomicCounter>,
    min_workers: usize,
    shutdown: Arc<AtomicBool>,
) -> JoinHandle<()> {
    live_workers.inc();
    thread::spawn(move || {
        loop {
            if shutdown.load(Ordering::SeqCst) {
                break;
            }
            match receiver.recv_timeout(IDLE_POLL) {
                Ok(Job::Run { state, task_fn, callback }) => {
                    let status = task_fn();
                    {
                        let (mut guard, _status) = state.status.lock();
                        *guard = Some(status);
                    }
                    state.condvar.broadcast();
                    if let Some(cb) = callback {
                        cb(status);
                    }
                }
                Ok(Job::Shutdown) => break,
                Err(RecvTimeoutError::Timeout) => {
                    if live_workers.get() > min_workers as i64 {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        live_workers.dec();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    #[test]
    fn enqueue_runs_task_and_reports_success() {
        let queue = WorkQueue::new(1, 2).unwrap();
        let task = queue
            .enqueue(
                || WorkQueueTaskStatus::Success,
                None::<fn(WorkQueueTaskStatus)>,
            )
            .unwrap();
        assert_eq!(task.wait(), WorkQueueTaskStatus::Success);
    }

    #[test]
    fn failure_status_is_reported() {
        let queue = WorkQueue::new(1, 1).unwrap();
        let task = queue
            .enqueue(
                || WorkQueueTaskStatus::Failure,
                None::<fn(WorkQueueTaskStatus)>,
            )
            .unwrap();
        assert_eq!(task.wait(), WorkQueueTaskStatus::Failure);
    }

    #[test]
    fn callback_runs_after_task_fn() {
        let queue = WorkQueue::new(1, 1).unwrap();
        let seen = Arc::new(StdMutex::new(None));
        let seen2 = Arc::clone(&seen);
        let task = queue
            .enqueue(
                || WorkQueueTaskStatus::Success,
                Some(move |status| {
                    *seen2.lock().unwrap() = Some(status);
                }),
            )
            .unwrap();
        task.wait();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(*seen.lock().unwrap(), Some(WorkQueueTaskStatus::Success));
    }

    #[test]
    fn hundred_short_tasks_all_complete_and_pool_scales_back_down() {
        let queue = WorkQueue::new(2, 4).unwrap();
        let completed = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<WorkQueueTask> = (0..100)
            .map(|_| {
                let completed = Arc::clone(&completed);
                queue
                    .enqueue(
                        move || {
                            thread::sleep(Duration::from_millis(1));
                            completed.fetch_add(1, Ordering::SeqCst);
                            WorkQueueTaskStatus::Success
                        },
                        None::<fn(WorkQueueTaskStatus)>,
                    )
                    .unwrap()
            })
            .collect();

        for task in &tasks {
            assert_eq!(task.wait(), WorkQueueTaskStatus::Success);
        }
        assert_eq!(completed.load(Ordering::SeqCst), 100);

        thread::sleep(IDLE_POLL * 4);
        assert_eq!(queue.live_workers(), queue.min_workers());
    }

    #[test]
    fn enqueue_after_shutdown_is_rejected() {
        let queue = WorkQueue::new(1, 1).unwrap();
        queue.shutdown().unwrap();
        let err = queue
            .enqueue(
                || WorkQueueTaskStatus::Success,
                None::<fn(WorkQueueTaskStatus)>,
            )
            .unwrap_err();
        assert!(matches!(err, WorkQueueError::ShuttingDown));
    }

    #[test]
    fn invalid_pool_sizes_are_rejected() {
        assert!(matches!(
            WorkQueue::new(0, 4).unwrap_err(),
            WorkQueueError::InvalidPoolSize
        ));
        assert!(matches!(
            WorkQueue::new(4, 2).unwrap_err(),
            WorkQueueError::InvalidPoolSize
        ));
    }
}

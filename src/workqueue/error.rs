//! `WorkQueue` error taxonomy, per `spec.md` §4.5/§7.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkQueueError {
    #[error("work queue is shutting down, no further tasks are accepted")]
    ShuttingDown,

    #[error("a worker thread panicked while joining during shutdown: {0}")]
    JoinFailed(String),

    #[error("minWorkers must be >= 1 and <= maxWorkers")]
    InvalidPoolSize,
}

pub type WorkQueueResult<T> = Result<T, WorkQueueError>;

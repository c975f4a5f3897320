//! `PQueue` error taxonomy, per `spec.md` §4.4/§7.

use thiserror::Error;

use crate::serialize::SerializeError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PQueueError {
    #[error("queue is empty")]
    QueueEmpty,

    #[error("queue is full")]
    QueueFull,

    #[error("timed out waiting for an element")]
    Timeout,

    #[error("failed to allocate the slot arena")]
    AllocFailed,

    #[error("setup_element was not called, or failed, before first use")]
    SetupFailed,

    #[error("no such queue (index out of range for PQueueArray)")]
    NoSuchQueue,

    #[error("failed to serialize a value into its slot: {0}")]
    StoreDataFailed(SerializeError),

    #[error("failed to deserialize a value out of its slot: {0}")]
    RetrieveDataFailed(SerializeError),
}

impl From<SerializeError> for PQueueError {
    fn from(e: SerializeError) -> Self {
        // The only place `Serializable::serialize` is driven from inside
        // this module is push/pop, so whichever direction was in flight
        // when the error surfaced tells us which slot-error kind applies.
        // `serialize_to_bytes`/`deserialize_from_bytes` re-wrap this
        // directly into the right variant instead of relying on this
        // blanket conversion; it exists so `?` works at either call site.
        PQueueError::StoreDataFailed(e)
    }
}

pub type PQueueResult<T> = Result<T, PQueueError>;

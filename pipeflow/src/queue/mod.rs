//! Bounded boundary queues between pipeline stages.
//!
//! Every edge of a pipeline (source to first stage, stage to stage, last
//! stage to sink) is one bounded FIFO. Producers wait while the queue is full
//! and consumers wait while it is empty and open, so a slow consumer paces
//! everything upstream of it instead of dropping records.
//!
//! Handles given to collaborators can push or pop but never close a queue.
//! Closing is reserved to the orchestrator, which closes each boundary exactly
//! once after every producer on it has exited.

use crate::core::Record;
use crate::errors::FlowError;

/// Creates a bounded queue with room for `capacity` records.
///
/// # Panics
///
/// Panics if `capacity` is zero; topologies are validated before queues
/// are built.
#[must_use]
pub fn bounded(capacity: usize) -> (QueueSender, QueueReceiver) {
    let (tx, rx) = async_channel::bounded(capacity);
    (QueueSender { tx }, QueueReceiver { rx })
}

/// Producing side of a boundary queue.
#[derive(Debug, Clone)]
pub struct QueueSender {
    tx: async_channel::Sender<Record>,
}

impl QueueSender {
    /// Pushes a record, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::QueueClosed`] if the queue was closed or every
    /// consumer of it has exited.
    pub async fn push(&self, record: Record) -> Result<(), FlowError> {
        self.tx.send(record).await.map_err(|_| FlowError::QueueClosed)
    }

    /// Number of records currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    /// Returns true if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Returns true if no more records can be pushed.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.tx.is_full()
    }

    /// Maximum number of buffered records.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(usize::MAX)
    }

    /// Returns true once the queue no longer accepts records.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Closes the queue. Returns false if it was already closed.
    ///
    /// Buffered records stay available to consumers.
    pub(crate) fn close(&self) -> bool {
        self.tx.close()
    }
}

/// Consuming side of a boundary queue.
#[derive(Debug, Clone)]
pub struct QueueReceiver {
    rx: async_channel::Receiver<Record>,
}

impl QueueReceiver {
    /// Pops the next record, waiting while the queue is empty and open.
    ///
    /// Returns `None` once the queue is closed and fully drained.
    pub async fn pop(&self) -> Option<Record> {
        self.rx.recv().await.ok()
    }

    /// Number of records currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Returns true if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Returns true once the producing side is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.rx.is_closed()
    }
}

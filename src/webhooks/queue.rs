// Bounded work queue for webhook payloads
//
// A tokio mpsc channel split into producer and consumer handles. The consumer
// yields `None` only once the queue is closed and drained, which keeps
// "closed" distinguishable from "empty but open".

use crate::webhooks::error::QueueError;
use crate::webhooks::payload::WebhookPayload;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Create a bounded queue holding at most `capacity` pending payloads
///
/// # Panics
///
/// Panics if `capacity` is zero.
pub fn work_queue(capacity: usize) -> (QueueProducer, QueueConsumer) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        QueueProducer { tx },
        QueueConsumer {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Producer side of the work queue
///
/// Clones share the queue; it closes once every clone has been closed or dropped.
#[derive(Debug, Clone)]
pub struct QueueProducer {
    tx: mpsc::Sender<WebhookPayload>,
}

impl QueueProducer {
    /// Enqueue, waiting for free capacity
    pub async fn enqueue(&self, payload: WebhookPayload) -> Result<(), QueueError> {
        self.tx.send(payload).await.map_err(|_| QueueError::Closed)
    }

    /// Enqueue from a thread outside the runtime, parking it until there is room
    ///
    /// # Panics
    ///
    /// Panics if called from within an async execution context.
    pub fn blocking_enqueue(&self, payload: WebhookPayload) -> Result<(), QueueError> {
        self.tx.blocking_send(payload).map_err(|_| QueueError::Closed)
    }

    /// Enqueue without waiting; rejects when the queue is full
    pub fn try_enqueue(&self, payload: WebhookPayload) -> Result<(), QueueError> {
        self.tx.try_send(payload).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    /// Signal that this producer will send nothing more
    pub fn close(self) {
        drop(self.tx);
    }

    /// Free slots right now
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

/// Consumer side of the work queue
///
/// Clones share one receiver, so several workers can drain the same queue.
/// Each payload is handed to exactly one consumer.
#[derive(Debug, Clone)]
pub struct QueueConsumer {
    rx: Arc<Mutex<mpsc::Receiver<WebhookPayload>>>,
}

impl QueueConsumer {
    /// Next payload in arrival order; `None` once closed and drained
    pub async fn next(&self) -> Option<WebhookPayload> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }
}

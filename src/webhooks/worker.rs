//! Delivery worker
//!
//! A worker drains the work queue one payload at a time and hands each payload
//! to its [`DeliveryHandler`], normally a [`RetryPolicy`]. It stops when the
//! queue is closed and drained, or when its cancellation token fires.
//!
//! Cancellation is only observed while waiting on the queue. A payload that
//! has already been dequeued finishes its whole retry cycle, backoff sleeps
//! included.

use crate::webhooks::payload::WebhookPayload;
use crate::webhooks::queue::QueueConsumer;
use crate::webhooks::retry::RetryPolicy;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Processes one dequeued payload to completion
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    async fn handle(&self, payload: WebhookPayload);
}

#[async_trait]
impl DeliveryHandler for RetryPolicy {
    async fn handle(&self, payload: WebhookPayload) {
        self.send_with_retries(&payload).await;
    }
}

/// Single consuming loop over a work queue
pub struct DeliveryWorker {
    id: usize,
    handler: Arc<dyn DeliveryHandler>,
}

impl DeliveryWorker {
    pub fn new(id: usize, handler: Arc<dyn DeliveryHandler>) -> Self {
        Self { id, handler }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Process payloads in queue order until closed+drained or cancelled
    pub async fn run(&self, cancel: CancellationToken, queue: QueueConsumer) {
        info!(worker_id = self.id, "delivery worker starting");

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!(worker_id = self.id, "delivery worker received shutdown signal");
                    break;
                }
                next = queue.next() => next,
            };

            let Some(payload) = next else {
                debug!(worker_id = self.id, "work queue closed and drained");
                break;
            };

            debug!(worker_id = self.id, webhook_id = %payload.id, "dequeued webhook");
            self.handler.handle(payload).await;
        }

        info!(worker_id = self.id, "delivery worker stopped");
    }

    /// Run the loop on its own tokio task
    pub fn spawn(self, cancel: CancellationToken, queue: QueueConsumer) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel, queue).await })
    }
}

/// Start `count` workers sharing one queue and one handler
///
/// Each worker keeps FIFO order for the payloads it takes; order across
/// workers is unspecified.
pub fn spawn_workers(
    count: usize,
    handler: Arc<dyn DeliveryHandler>,
    queue: QueueConsumer,
    cancel: CancellationToken,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|id| DeliveryWorker::new(id, handler.clone()).spawn(cancel.clone(), queue.clone()))
        .collect()
}

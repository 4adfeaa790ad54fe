// Webhook delivery pipeline
//
// Handles:
// - Bounded work queue between producers and workers
// - Delivery workers draining the queue until closed or cancelled
// - Fixed-budget retry loop with capped exponential backoff
// - HTTP send and response classification

pub mod delivery;
pub mod error;
pub mod payload;
pub mod queue;
pub mod retry;
pub mod transport;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use delivery::{AttemptReport, Classification, DeliveryPipeline, WebhookSender, SECRET_HASH_HEADER};
pub use error::{DeliveryError, QueueError};
pub use payload::WebhookPayload;
pub use queue::{work_queue, QueueConsumer, QueueProducer};
pub use retry::{next_backoff, DeliveryAttempt, RetryPolicy, RetrySettings, Sleeper, TokioSleeper};
pub use transport::{HttpTransport, ReqwestTransport, TransportError};
pub use worker::{spawn_workers, DeliveryHandler, DeliveryWorker};

//! Webhook delivery error types
//!
//! A non-200 response is not an error here. It is reported through
//! [`crate::webhooks::delivery::Classification`] and a warning log.

use crate::webhooks::transport::TransportError;

/// Errors that end a single delivery attempt, or a whole retry cycle
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// Payload body could not be encoded
    #[error("error marshaling JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed URL or header value
    #[error("error during the webhook request preparation: {0}")]
    Request(String),

    /// Connection, DNS or timeout failure; no response available
    #[error("webhook request failed: {0}")]
    Transport(#[from] TransportError),

    /// Response arrived but its body could not be read
    #[error("error reading response body: {0}")]
    ResponseBody(TransportError),

    /// Every attempt ran and the last one was not delivered
    #[error("webhook {webhook_id} not delivered after {attempts} attempts: {last_failure}")]
    AttemptsExhausted {
        webhook_id: String,
        attempts: u32,
        last_failure: String,
    },
}

/// Errors seen by producers pushing onto the work queue
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// Queue is at capacity (non-blocking enqueue only)
    #[error("work queue is full")]
    Full,

    /// Every consumer has gone away
    #[error("work queue is closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_message_names_webhook() {
        let err = DeliveryError::AttemptsExhausted {
            webhook_id: "hook-9".to_string(),
            attempts: 5,
            last_failure: "HTTP 503".to_string(),
        };
        assert_eq!(err.to_string(), "webhook hook-9 not delivered after 5 attempts: HTTP 503");
    }

    #[test]
    fn test_transport_error_converts() {
        let err: DeliveryError = TransportError::Timeout.into();
        assert!(matches!(err, DeliveryError::Transport(TransportError::Timeout)));
    }
}

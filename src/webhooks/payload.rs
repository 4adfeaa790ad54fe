// Webhook payload - the unit of work carried through the queue
//
// A payload is immutable once enqueued. The delivery pipeline only reads it,
// once per attempt.

use serde::{Deserialize, Serialize};

/// A single webhook delivery request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    /// Subscription/event identifier, used only to correlate log events
    #[serde(alias = "webhookId")]
    pub id: String,

    /// Destination endpoint. An empty URL fails at send time.
    #[serde(rename = "url", alias = "targetUrl", default)]
    pub target_url: String,

    /// Precomputed signing token, sent verbatim as `X-Secret-Hash`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_hash: Option<String>,

    /// Event data, serialized as the request body
    #[serde(alias = "data", default)]
    pub body: serde_json::Value,
}

impl WebhookPayload {
    /// Create a payload without a secret
    pub fn new(id: impl Into<String>, target_url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            target_url: target_url.into(),
            secret_hash: None,
            body,
        }
    }

    /// Attach a precomputed secret hash
    pub fn with_secret_hash(mut self, secret_hash: impl Into<String>) -> Self {
        self.secret_hash = Some(secret_hash.into());
        self
    }

    /// The secret to transmit, if any. Empty secrets count as absent.
    pub fn secret(&self) -> Option<&str> {
        self.secret_hash.as_deref().filter(|s| !s.is_empty())
    }
}

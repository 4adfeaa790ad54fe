//! HTTP Transport Layer
//!
//! The delivery pipeline never talks to `reqwest::Client` directly. It hands a
//! fully built request to an [`HttpTransport`], which makes the pipeline
//! testable with canned responses.

use async_trait::async_trait;
use std::time::Duration;

/// Transport-level failures. No response is available when one of these occurs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Request did not complete within the configured timeout
    #[error("request timed out")]
    Timeout,

    /// Connection refused, DNS failure, TLS failure
    #[error("connection failed: {0}")]
    Connect(String),

    /// Any other client-side failure
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// Executes outbound webhook requests
///
/// Implementations hold no per-call mutable state and may be shared by many
/// workers.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Execute the request and return the raw response
    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, TransportError>;
}

/// Default transport backed by a pooled `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Build a transport whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TransportError::from)?;

        Ok(Self { client, timeout })
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, TransportError> {
        tracing::debug!(url = %request.url(), "executing webhook request");
        Ok(self.client.execute(request).await?)
    }
}

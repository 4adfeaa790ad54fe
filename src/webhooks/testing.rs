// Recording fakes for the delivery collaborators (test builds only)

use crate::logging::{Severity, WebhookLogger};
use crate::webhooks::delivery::{AttemptReport, Classification, WebhookSender};
use crate::webhooks::error::DeliveryError;
use crate::webhooks::payload::WebhookPayload;
use crate::webhooks::retry::Sleeper;
use crate::webhooks::transport::{HttpTransport, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::Method;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Logger that keeps every event in memory
#[derive(Default)]
pub struct RecordingLogger {
    events: Mutex<Vec<(Severity, String, String)>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _, _)| *s == severity)
            .count()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, m)| m.clone())
            .collect()
    }
}

impl WebhookLogger for RecordingLogger {
    fn log(&self, severity: Severity, webhook_id: &str, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push((severity, webhook_id.to_string(), message.to_string()));
    }
}

/// Sleeper that returns immediately and remembers the requested delays
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Scripted result of one `send_payload` call
#[derive(Debug, Clone, Copy)]
pub enum Step {
    /// 200 response
    Deliver,
    /// Non-200 response with the given status
    Status(u16),
    /// Transport error
    Fail,
}

/// Sender that replays a script, repeating its last step once exhausted
pub struct ScriptedSender {
    steps: Mutex<VecDeque<Step>>,
    fallback: Step,
    calls: AtomicUsize,
}

impl ScriptedSender {
    pub fn new(steps: Vec<Step>) -> Self {
        let fallback = steps.last().copied().unwrap_or(Step::Deliver);
        Self {
            steps: Mutex::new(steps.into()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(step: Step) -> Self {
        Self::new(vec![step])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebhookSender for ScriptedSender {
    async fn send_payload(&self, _payload: &WebhookPayload) -> Result<AttemptReport, DeliveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().unwrap().pop_front().unwrap_or(self.fallback);

        match step {
            Step::Deliver => Ok(AttemptReport {
                classification: Classification::Delivered,
                status_code: 200,
                body: Bytes::new(),
            }),
            Step::Status(status) => Ok(AttemptReport {
                classification: Classification::Failed,
                status_code: status,
                body: Bytes::from_static(b"unavailable"),
            }),
            Step::Fail => Err(DeliveryError::Transport(TransportError::Connect(
                "connection refused".to_string(),
            ))),
        }
    }
}

/// Request as seen by [`StubTransport`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Transport answering every request with the same canned response or error
pub struct StubTransport {
    status: u16,
    body: &'static str,
    error: Option<TransportError>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl StubTransport {
    pub fn responding(status: u16, body: &'static str) -> Self {
        Self {
            status,
            body,
            error: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: TransportError) -> Self {
        Self {
            status: 0,
            body: "",
            error: Some(error),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for StubTransport {
    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, TransportError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method: request.method().clone(),
            url: request.url().to_string(),
            headers: request.headers().clone(),
            body: request
                .body()
                .and_then(|b| b.as_bytes())
                .map(|b| b.to_vec())
                .unwrap_or_default(),
        });

        if let Some(err) = &self.error {
            return Err(err.clone());
        }

        let response = http::Response::builder()
            .status(self.status)
            .body(self.body)
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(reqwest::Response::from(response))
    }
}

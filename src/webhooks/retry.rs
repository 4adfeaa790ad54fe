// Exponential backoff retry logic for webhook delivery
//
// Implements a fixed-budget attempt loop:
// - Exactly `max_attempts` sends per payload, even after an early success
// - Doubling backoff between attempts, capped at `max_backoff`
// - No jitter: delays are fully determined by the previous delay
// - One log event per attempt, plus one on abandonment

use crate::logging::{Severity, WebhookLogger};
use crate::webhooks::delivery::{AttemptReport, Classification, WebhookSender};
use crate::webhooks::error::DeliveryError;
use crate::webhooks::payload::WebhookPayload;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Retry budget and backoff bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    /// Attempts per payload (including the first)
    pub max_attempts: u32,
    /// Delay slept before the second attempt
    pub initial_backoff: Duration,
    /// Upper bound for any single delay
    pub max_backoff: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetrySettings {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            max_backoff,
        }
    }

    /// Next delay after `current`, see [`next_backoff`]
    pub fn next_backoff(&self, current: Duration) -> Duration {
        next_backoff(current, self.max_backoff)
    }
}

/// Double `current`, never exceeding `max_backoff`
///
/// Returns `max_backoff` exactly whenever doubling would overshoot it.
pub fn next_backoff(current: Duration, max_backoff: Duration) -> Duration {
    match current.checked_mul(2) {
        Some(doubled) if doubled <= max_backoff => doubled,
        _ => max_backoff,
    }
}

/// Suspends the current task between attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Record of one attempt inside the retry loop. Not retained after logging.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryAttempt {
    /// 1-based attempt index
    pub number: u32,
    /// Delay slept before this attempt (zero for the first)
    pub backoff_before: Duration,
    /// Verdict; `Failed` when the send returned an error
    pub classification: Classification,
    /// Status code, when the endpoint answered
    pub status_code: Option<u16>,
    /// Leading part of the response body, when the endpoint answered
    pub body_snippet: Option<String>,
    /// Send error, when there was no usable response
    pub error: Option<String>,
}

impl DeliveryAttempt {
    fn from_result(
        number: u32,
        backoff_before: Duration,
        result: &Result<AttemptReport, DeliveryError>,
    ) -> Self {
        match result {
            Ok(report) => Self {
                number,
                backoff_before,
                classification: report.classification,
                status_code: Some(report.status_code),
                body_snippet: Some(report.body_snippet()),
                error: None,
            },
            Err(err) => Self {
                number,
                backoff_before,
                classification: Classification::Failed,
                status_code: None,
                body_snippet: None,
                error: Some(err.to_string()),
            },
        }
    }

    /// Severity of this attempt's log event
    pub fn severity(&self) -> Severity {
        match (self.classification, &self.error) {
            (Classification::Delivered, _) => Severity::Info,
            (Classification::Failed, None) => Severity::Warning,
            (Classification::Failed, Some(_)) => Severity::Error,
        }
    }

    /// Human-readable summary used in log events
    pub fn describe(&self, max_attempts: u32) -> String {
        let label = if self.backoff_before.is_zero() {
            format!("attempt {}/{}", self.number, max_attempts)
        } else {
            format!(
                "attempt {}/{} after {:?} backoff",
                self.number, max_attempts, self.backoff_before
            )
        };

        match (&self.error, self.status_code) {
            (Some(err), _) => format!("{} failed: {}", label, err),
            (None, Some(status)) if self.classification == Classification::Delivered => {
                format!("{} delivered (HTTP {})", label, status)
            }
            (None, Some(status)) => format!(
                "{} not delivered: HTTP {}, response body: {}",
                label,
                status,
                self.body_snippet.as_deref().unwrap_or("")
            ),
            (None, None) => format!("{} finished", label),
        }
    }
}

/// Drives a fixed number of delivery attempts for each payload
pub struct RetryPolicy {
    settings: RetrySettings,
    sender: Arc<dyn WebhookSender>,
    logger: Arc<dyn WebhookLogger>,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryPolicy {
    /// Create a policy that sleeps on the tokio timer
    pub fn new(
        settings: RetrySettings,
        sender: Arc<dyn WebhookSender>,
        logger: Arc<dyn WebhookLogger>,
    ) -> Self {
        Self {
            settings,
            sender,
            logger,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace the sleeper used between attempts
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn settings(&self) -> &RetrySettings {
        &self.settings
    }

    /// Run exactly `max_attempts` attempts and report the last one
    ///
    /// The loop does not stop on an early success. The outcome is the last
    /// attempt's report when it was delivered, otherwise
    /// [`DeliveryError::AttemptsExhausted`].
    pub async fn deliver_with_retries(
        &self,
        payload: &WebhookPayload,
    ) -> Result<AttemptReport, DeliveryError> {
        let max_attempts = self.settings.max_attempts;
        let mut backoff = self.settings.initial_backoff;
        let mut slept = Duration::ZERO;
        let mut last: Option<Result<AttemptReport, DeliveryError>> = None;

        for number in 1..=max_attempts {
            if number > 1 {
                debug!(webhook_id = %payload.id, attempt = number, ?backoff, "waiting before next attempt");
                self.sleeper.sleep(backoff).await;
                slept = backoff;
                backoff = self.settings.next_backoff(backoff);
            }

            let result = self.sender.send_payload(payload).await;
            let attempt = DeliveryAttempt::from_result(number, slept, &result);
            self.logger
                .log(attempt.severity(), &payload.id, &attempt.describe(max_attempts));

            last = Some(result);
        }

        match last {
            Some(Ok(report)) if report.is_delivered() => Ok(report),
            Some(Ok(report)) => Err(DeliveryError::AttemptsExhausted {
                webhook_id: payload.id.clone(),
                attempts: max_attempts,
                last_failure: format!("HTTP {}", report.status_code),
            }),
            Some(Err(err)) => Err(DeliveryError::AttemptsExhausted {
                webhook_id: payload.id.clone(),
                attempts: max_attempts,
                last_failure: err.to_string(),
            }),
            None => Err(DeliveryError::AttemptsExhausted {
                webhook_id: payload.id.clone(),
                attempts: 0,
                last_failure: "no attempts configured".to_string(),
            }),
        }
    }

    /// Deliver with retries and log abandonment on failure
    ///
    /// Nothing is logged here on success; per-attempt events were already
    /// emitted by [`RetryPolicy::deliver_with_retries`].
    pub async fn send_with_retries(&self, payload: &WebhookPayload) {
        if let Err(err) = self.deliver_with_retries(payload).await {
            self.logger.log(
                Severity::Error,
                &payload.id,
                &format!("webhook delivery abandoned: {}", err),
            );
        }
    }
}

//! Structured logging
//!
//! Delivery components report classified events through [`WebhookLogger`].
//! The default [`TracingLogger`] forwards them to `tracing`; the binary
//! installs the subscriber with [`init_tracing`].

use crate::config::LoggingConfig;
use anyhow::Result;
use std::fmt;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Severity of a delivery log event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Attempt delivered
    Info,
    /// Endpoint answered with a non-200 status
    Warning,
    /// Serialization, request, transport failure, or abandonment
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Sink for delivery log events
///
/// Failures inside the logger are not reported back to callers.
pub trait WebhookLogger: Send + Sync {
    fn log(&self, severity: Severity, webhook_id: &str, message: &str);
}

/// Logger that emits `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl WebhookLogger for TracingLogger {
    fn log(&self, severity: Severity, webhook_id: &str, message: &str) {
        match severity {
            Severity::Info => tracing::info!(webhook_id = %webhook_id, "{}", message),
            Severity::Warning => tracing::warn!(webhook_id = %webhook_id, "{}", message),
            Severity::Error => tracing::error!(webhook_id = %webhook_id, "{}", message),
        }
    }
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured level; `verbose` raises the
/// default to DEBUG.
pub fn init_tracing(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = if verbose {
        Level::DEBUG
    } else {
        config.level()?
    };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match config.format.to_lowercase().as_str() {
        "json" => builder.json().try_init(),
        "pretty" => builder.pretty().try_init(),
        _ => builder.compact().try_init(),
    };

    installed.map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))
}

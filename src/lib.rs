//! webhook-relay library
//!
//! Asynchronous webhook delivery: producers push [`webhooks::WebhookPayload`]s
//! onto a bounded work queue, delivery workers drain it, and every payload is
//! sent through a fixed-budget exponential-backoff retry loop.

pub mod config;
pub mod logging;
pub mod webhooks;

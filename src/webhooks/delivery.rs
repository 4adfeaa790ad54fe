// Webhook delivery pipeline
//
// Serializes a payload body, builds the POST request, executes it through the
// injected transport and classifies the response. Only status 200 counts as
// delivered.

use crate::logging::{Severity, WebhookLogger};
use crate::webhooks::error::DeliveryError;
use crate::webhooks::payload::WebhookPayload;
use crate::webhooks::transport::HttpTransport;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Request, Url};
use serde::Serialize;
use std::sync::Arc;

/// Header carrying the precomputed secret hash
pub const SECRET_HASH_HEADER: &str = "X-Secret-Hash";

const JSON_CONTENT_TYPE: &str = "application/json";
const SNIPPET_LEN: usize = 256;

/// Delivered/failed verdict for one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Delivered,
    Failed,
}

/// What the endpoint answered for one attempt
///
/// A `Failed` classification is reported here, not as an error.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptReport {
    pub classification: Classification,
    pub status_code: u16,
    pub body: Bytes,
}

impl AttemptReport {
    pub fn is_delivered(&self) -> bool {
        self.classification == Classification::Delivered
    }

    /// Lossy UTF-8 prefix of the response body
    pub fn body_snippet(&self) -> String {
        let end = self.body.len().min(SNIPPET_LEN);
        String::from_utf8_lossy(&self.body[..end]).into_owned()
    }
}

/// One delivery attempt for a payload
#[async_trait]
pub trait WebhookSender: Send + Sync {
    async fn send_payload(&self, payload: &WebhookPayload) -> Result<AttemptReport, DeliveryError>;
}

/// HTTP send and response classification
pub struct DeliveryPipeline {
    transport: Arc<dyn HttpTransport>,
    logger: Arc<dyn WebhookLogger>,
}

impl DeliveryPipeline {
    pub fn new(transport: Arc<dyn HttpTransport>, logger: Arc<dyn WebhookLogger>) -> Self {
        Self { transport, logger }
    }

    /// Send `body` to `url` once
    ///
    /// # Errors
    ///
    /// Returns an error for serialization, request construction, transport
    /// and body read failures. A non-200 answer is `Ok` with a `Failed`
    /// classification.
    pub async fn send<T>(
        &self,
        body: &T,
        url: &str,
        webhook_id: &str,
        secret_hash: &str,
    ) -> Result<AttemptReport, DeliveryError>
    where
        T: Serialize + ?Sized,
    {
        let json = self.marshal_json(body, webhook_id)?;
        let request = self.prepare_request(url, json, secret_hash, webhook_id)?;

        let response = self.transport.execute(request).await?;

        self.process_response(response, webhook_id).await
    }

    fn marshal_json<T>(&self, body: &T, webhook_id: &str) -> Result<Vec<u8>, DeliveryError>
    where
        T: Serialize + ?Sized,
    {
        serde_json::to_vec(body).map_err(|e| {
            let err = DeliveryError::Serialization(e);
            self.logger.log(Severity::Error, webhook_id, &err.to_string());
            err
        })
    }

    fn prepare_request(
        &self,
        url: &str,
        json: Vec<u8>,
        secret_hash: &str,
        webhook_id: &str,
    ) -> Result<Request, DeliveryError> {
        build_request(url, json, secret_hash).inspect_err(|err| {
            self.logger.log(Severity::Error, webhook_id, &err.to_string());
        })
    }

    async fn process_response(
        &self,
        response: reqwest::Response,
        webhook_id: &str,
    ) -> Result<AttemptReport, DeliveryError> {
        let status_code = response.status().as_u16();

        // `bytes()` consumes the response, so it is released on both paths
        let body = response.bytes().await.map_err(|e| {
            let err = DeliveryError::ResponseBody(e.into());
            self.logger.log(Severity::Error, webhook_id, &err.to_string());
            err
        })?;

        let classification = if status_code == 200 {
            Classification::Delivered
        } else {
            Classification::Failed
        };

        if classification == Classification::Failed {
            self.logger.log(
                Severity::Warning,
                webhook_id,
                &format!(
                    "HTTP request failed with status code: {}, response body: {}",
                    status_code,
                    String::from_utf8_lossy(&body)
                ),
            );
        }

        Ok(AttemptReport {
            classification,
            status_code,
            body,
        })
    }
}

#[async_trait]
impl WebhookSender for DeliveryPipeline {
    async fn send_payload(&self, payload: &WebhookPayload) -> Result<AttemptReport, DeliveryError> {
        self.send(
            &payload.body,
            &payload.target_url,
            &payload.id,
            payload.secret().unwrap_or(""),
        )
        .await
    }
}

/// Build the outbound POST
///
/// `X-Secret-Hash` is set only when `secret_hash` is non-empty.
pub fn build_request(url: &str, json: Vec<u8>, secret_hash: &str) -> Result<Request, DeliveryError> {
    let url = Url::parse(url)
        .map_err(|e| DeliveryError::Request(format!("invalid URL {:?}: {}", url, e)))?;

    let mut request = Request::new(Method::POST, url);
    request
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));

    if !secret_hash.is_empty() {
        let value = HeaderValue::from_bytes(secret_hash.as_bytes())
            .map_err(|e| DeliveryError::Request(format!("invalid secret hash header: {}", e)))?;
        request.headers_mut().insert(SECRET_HASH_HEADER, value);
    }

    *request.body_mut() = Some(json.into());
    Ok(request)
}

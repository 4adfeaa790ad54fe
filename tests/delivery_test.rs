//! End-to-end delivery tests against a local mock endpoint.
//!
//! Exercises the real reqwest transport, the delivery pipeline, the retry
//! policy and the worker loop together.

use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use webhook_relay::logging::{Severity, WebhookLogger};
use webhook_relay::webhooks::{
    work_queue, Classification, DeliveryError, DeliveryPipeline, DeliveryWorker, ReqwestTransport,
    RetryPolicy, RetrySettings, Sleeper, WebhookPayload, SECRET_HASH_HEADER,
};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

#[derive(Default)]
struct CollectingLogger {
    events: Mutex<Vec<(Severity, String)>>,
}

impl CollectingLogger {
    fn count(&self, severity: Severity) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == severity)
            .count()
    }

    fn messages(&self) -> Vec<String> {
        self.events.lock().unwrap().iter().map(|(_, m)| m.clone()).collect()
    }
}

impl WebhookLogger for CollectingLogger {
    fn log(&self, severity: Severity, _webhook_id: &str, message: &str) {
        self.events.lock().unwrap().push((severity, message.to_string()));
    }
}

struct NoSleep;

#[async_trait]
impl Sleeper for NoSleep {
    async fn sleep(&self, _duration: Duration) {}
}

fn pipeline(logger: Arc<CollectingLogger>) -> DeliveryPipeline {
    let transport = ReqwestTransport::new(Duration::from_secs(5)).expect("client builds");
    DeliveryPipeline::new(Arc::new(transport), logger)
}

#[tokio::test]
async fn delivers_json_with_secret_header() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hooks/orders"))
        .and(header("content-type", "application/json"))
        .and(header(SECRET_HASH_HEADER, "abc123"))
        .and(body_json(json!({"order": 42})))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(1)
        .mount(&server)
        .await;

    let logger = Arc::new(CollectingLogger::default());
    let report = pipeline(logger.clone())
        .send(
            &json!({"order": 42}),
            &format!("{}/hooks/orders", server.uri()),
            "orders-1",
            "abc123",
        )
        .await
        .expect("send succeeds");

    assert_eq!(report.classification, Classification::Delivered);
    assert_eq!(report.status_code, 200);
    assert_eq!(report.body_snippet(), "OK");
    assert_eq!(logger.count(Severity::Warning), 0);
}

#[tokio::test]
async fn omits_secret_header_when_empty() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let logger = Arc::new(CollectingLogger::default());
    pipeline(logger)
        .send(&json!({}), &format!("{}/hook", server.uri()), "h", "")
        .await
        .expect("send succeeds");

    let received: Vec<Request> = server.received_requests().await.expect("recording enabled");
    assert_eq!(received.len(), 1);
    assert!(!received[0].headers.contains_key(SECRET_HASH_HEADER));
}

#[tokio::test]
async fn server_error_is_classified_not_returned() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let logger = Arc::new(CollectingLogger::default());
    let report = pipeline(logger.clone())
        .send(&json!({"x": 1}), &format!("{}/hook", server.uri()), "h", "")
        .await
        .expect("HTTP-level failure is not an error");

    assert_eq!(report.classification, Classification::Failed);
    assert_eq!(logger.count(Severity::Warning), 1);
    let messages = logger.messages();
    let warning = &messages[0];
    assert!(warning.contains("500"));
    assert!(warning.contains("Internal Server Error"));
}

#[tokio::test]
async fn truncated_body_is_response_body_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Promise 100 body bytes, send 5, then hang up
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut chunk = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") || !request.ends_with(b"{}") {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&chunk[..n]);
        }
        socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nshort")
            .await
            .unwrap();
        socket.shutdown().await.unwrap();
    });

    let logger = Arc::new(CollectingLogger::default());
    let result = pipeline(logger.clone())
        .send(&json!({}), &format!("http://{}/hook", addr), "cut-short", "")
        .await;

    assert!(matches!(result, Err(DeliveryError::ResponseBody(_))), "got {:?}", result);
    assert_eq!(logger.count(Severity::Error), 1);
    assert_eq!(logger.count(Severity::Warning), 0);
    server.await.unwrap();
}

#[tokio::test]
async fn retry_policy_sends_every_attempt() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;

    let logger = Arc::new(CollectingLogger::default());
    let settings = RetrySettings::new(3, Duration::from_millis(1), Duration::from_millis(4));
    let policy = RetryPolicy::new(settings, Arc::new(pipeline(logger.clone())), logger.clone())
        .with_sleeper(Arc::new(NoSleep));

    let payload = WebhookPayload::new("h-1", format!("{}/hook", server.uri()), json!({"a": true}));
    let outcome = policy.deliver_with_retries(&payload).await;

    assert!(outcome.is_ok());
    assert_eq!(logger.count(Severity::Info), 3);
}

#[tokio::test]
async fn unreachable_endpoint_is_abandoned() {
    // Bind then drop a listener so its port refuses connections
    let uri = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };

    let logger = Arc::new(CollectingLogger::default());
    let settings = RetrySettings::new(2, Duration::from_millis(1), Duration::from_millis(2));
    let policy = RetryPolicy::new(settings, Arc::new(pipeline(logger.clone())), logger.clone())
        .with_sleeper(Arc::new(NoSleep));

    let payload = WebhookPayload::new("gone", format!("{}/hook", uri), json!({}));
    let outcome = policy.deliver_with_retries(&payload).await;

    assert!(matches!(
        outcome,
        Err(DeliveryError::AttemptsExhausted { attempts: 2, .. })
    ));
    assert_eq!(logger.count(Severity::Error), 2);
}

#[tokio::test]
async fn worker_delivers_queue_in_order() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let logger = Arc::new(CollectingLogger::default());
    let settings = RetrySettings::new(1, Duration::from_millis(1), Duration::from_millis(1));
    let policy = RetryPolicy::new(settings, Arc::new(pipeline(logger.clone())), logger.clone())
        .with_sleeper(Arc::new(NoSleep));

    let (producer, consumer) = work_queue(8);
    for n in 0..5 {
        let payload = WebhookPayload::new(
            format!("w-{}", n),
            format!("{}/hook", server.uri()),
            json!({"seq": n}),
        );
        producer.enqueue(payload).await.unwrap();
    }
    producer.close();

    DeliveryWorker::new(0, Arc::new(policy))
        .run(CancellationToken::new(), consumer)
        .await;

    let received = server.received_requests().await.expect("recording enabled");
    let sequence: Vec<i64> = received
        .iter()
        .map(|r| {
            let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
            body["seq"].as_i64().unwrap()
        })
        .collect();
    assert_eq!(sequence, vec![0, 1, 2, 3, 4]);
    assert_eq!(logger.count(Severity::Error), 0);
}

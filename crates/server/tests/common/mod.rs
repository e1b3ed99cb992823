//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process router
//! backed by a running scheduler whose pipeline uses the core mocks, so jobs
//! run end to end without ffmpeg or a bot token.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use mediarelay_core::pipeline::PipelineRunner;
use mediarelay_core::probe::MediaProbe;
use mediarelay_core::storage::{StorageArena, StorageConfig};
use mediarelay_core::testing::{MockProbe, MockTranscoder, MockTransport};
use mediarelay_core::transcoder::Transcoder;
use mediarelay_core::transport::TransportAdapter;
use mediarelay_core::{load_config_from_str, Config, Scheduler};
use mediarelay_server::state::{AppState, Relay};

/// Re-export fixtures for test convenience
pub use mediarelay_core::testing::fixtures;

const TEST_CONFIG: &str = r#"
[scheduler]
workers = 1
max_in_flight = 4
per_user_limit = 2

[scheduler.retry]
max_attempts = 2
initial_delay_ms = 1
max_delay_ms = 5

[transport]
backend = "telegram"

[transport.telegram]
bot_token = "123456:test-secret-token"
"#;

/// Test fixture for API testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_job_submission() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/api/v1/jobs", job_body("7", "file-1")).await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Scheduler behind the router
    pub scheduler: Arc<Scheduler<Relay>>,
    /// Mock transport - inspect uploads and status edits
    pub transport: Arc<MockTransport>,
    /// Mock transcoder - inject failures and delays
    pub transcoder: Arc<MockTranscoder>,
    /// Scratch root
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut config: Config = load_config_from_str(TEST_CONFIG).expect("Invalid test config");
        config.storage = StorageConfig::with_root(temp_dir.path());

        let storage = StorageArena::new(config.storage.clone());
        storage.init().await.expect("Failed to init scratch");

        let transport = Arc::new(MockTransport::new());
        let transcoder = Arc::new(MockTranscoder::new());

        let probe: Arc<dyn MediaProbe> = Arc::new(MockProbe::new());
        let runner: Relay = PipelineRunner::new(
            config.pipeline.clone(),
            probe,
            Arc::clone(&transcoder) as Arc<dyn Transcoder>,
            Arc::clone(&transport) as Arc<dyn TransportAdapter>,
            storage.clone(),
        );
        let scheduler = Arc::new(Scheduler::new(config.scheduler.clone(), Arc::new(runner)));
        scheduler.start();

        let state = Arc::new(AppState::new(config, Arc::clone(&scheduler), storage));
        let router = mediarelay_server::api::create_router(state);

        Self {
            router,
            scheduler,
            transport,
            transcoder,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a GET request and return the body as text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Polls a job until it reaches a terminal status.
    pub async fn wait_for_terminal(&self, id: &str) -> Value {
        let poll = async {
            loop {
                let response = self.get(&format!("/api/v1/jobs/{}", id)).await;
                let status = response.body["status"].as_str().unwrap_or_default().to_string();
                if ["done", "failed", "cancelled"].contains(&status.as_str()) {
                    return response.body;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(10), poll)
            .await
            .expect("job did not finish in time")
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// A submission body for a single MP4 output.
pub fn job_body(requester: &str, locator: &str) -> Value {
    serde_json::to_value(fixtures::mp4_request(requester, locator)).unwrap()
}

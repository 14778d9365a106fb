//! Common test utilities and helpers
//!
//! Integration tests start the real router on a random local port and drive
//! it over HTTP with reqwest.

use cid_registry_api::{build_api_server_with_config, MiddlewareConfig};
use cid_registry_db::{BroadcastEventPublisher, MemoryRecordRepository, RecordRepository};
use cid_registry_service::{ContentStoreConfig, MemoryContentStore, ServiceRegistry, ValidationConfig};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub mod fixtures;

/// Test application settings
pub struct TestAppBuilder {
    repository: Arc<dyn RecordRepository>,
    validation: ValidationConfig,
    content_store: Option<ContentStoreConfig>,
    upload_timeout: Duration,
    max_body_bytes: Option<usize>,
}

impl TestAppBuilder {
    /// Serve uploads from an in-memory content store
    pub fn with_uploads(mut self, config: ContentStoreConfig) -> Self {
        self.content_store = Some(config);
        self
    }

    /// Back the registry with a specific repository
    pub fn with_repository(mut self, repository: Arc<dyn RecordRepository>) -> Self {
        self.repository = repository;
        self
    }

    /// Only accept CIDv0/CIDv1 strings
    pub fn strict(mut self) -> Self {
        self.validation.strict_cid_format = true;
        self
    }

    /// Cap request bodies
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = Some(limit);
        self
    }

    /// Start the server
    pub async fn spawn(self) -> TestApp {
        let events = BroadcastEventPublisher::default();
        let mut services = ServiceRegistry::new(
            self.repository.clone(),
            Arc::new(events.clone()),
            self.validation,
        )
        .with_event_feed(events.clone());

        let content_store = self.content_store.map(|config| Arc::new(MemoryContentStore::new(config)));
        if let Some(store) = &content_store {
            services = services.with_content_store(store.clone(), self.upload_timeout);
        }

        let mut middleware = MiddlewareConfig::new().with_tracing(false);
        if let Some(limit) = self.max_body_bytes {
            middleware = middleware.with_max_body_bytes(limit);
        }

        let app = build_api_server_with_config(services, middleware);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind random port");
        let address = listener.local_addr().expect("Failed to get local address");

        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Failed to start test server");
        });

        TestApp {
            address: format!("http://{}", address),
            repository: self.repository,
            events,
            content_store,
            server,
        }
    }
}

/// Running test application
pub struct TestApp {
    pub address: String,
    pub repository: Arc<dyn RecordRepository>,
    pub events: BroadcastEventPublisher,
    pub content_store: Option<Arc<MemoryContentStore>>,
    server: JoinHandle<()>,
}

impl TestApp {
    /// Builder over an empty in-memory registry
    pub fn builder() -> TestAppBuilder {
        TestAppBuilder {
            repository: Arc::new(MemoryRecordRepository::new()),
            validation: ValidationConfig::default(),
            content_store: None,
            upload_timeout: Duration::from_secs(5),
            max_body_bytes: None,
        }
    }

    /// Server over an empty in-memory registry without uploads
    pub async fn new() -> Self {
        Self::builder().spawn().await
    }

    /// Get base URL
    pub fn url(&self) -> &str {
        &self.address
    }

    /// Create HTTP client
    pub fn client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to build client")
    }

    /// POST /v1/registrations
    pub async fn register(&self, cid: &str) -> reqwest::Response {
        self.client()
            .post(format!("{}/v1/registrations", self.url()))
            .json(&serde_json::json!({ "cid": cid }))
            .send()
            .await
            .expect("Failed to send request")
    }

    /// GET /v1/registrations/{handle}
    pub async fn get_record(&self, handle: impl std::fmt::Display) -> reqwest::Response {
        self.client()
            .get(format!("{}/v1/registrations/{}", self.url(), handle))
            .send()
            .await
            .expect("Failed to send request")
    }

    /// GET /v1/registrations/count, returning the count
    pub async fn count(&self) -> u64 {
        let response = self
            .client()
            .get(format!("{}/v1/registrations/count", self.url()))
            .send()
            .await
            .expect("Failed to send request");
        assert_status(&response, reqwest::StatusCode::OK);

        let body: Value = parse_json(response).await;
        body["data"]["count"].as_u64().expect("count is not a number")
    }

    /// POST /v1/uploads with a raw body
    pub async fn upload(&self, blob: Vec<u8>) -> reqwest::Response {
        self.client()
            .post(format!("{}/v1/uploads", self.url()))
            .header("Content-Type", "application/octet-stream")
            .body(blob)
            .send()
            .await
            .expect("Failed to send request")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Parse JSON response
pub async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> T {
    response
        .json::<T>()
        .await
        .expect("Failed to parse JSON response")
}

/// Assert response status
pub fn assert_status(response: &reqwest::Response, expected: reqwest::StatusCode) {
    assert_eq!(
        response.status(),
        expected,
        "Expected status {}, got {}",
        expected,
        response.status()
    );
}

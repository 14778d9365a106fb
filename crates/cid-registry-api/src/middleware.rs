//! API middleware
//!
//! Middleware layers for request processing: tracing, CORS, request IDs and
//! upload size limits.

use axum::http::{header, HeaderName, HeaderValue, Method, Request};
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    cors::{Any, CorsLayer},
    request_id::{MakeRequestId, RequestId},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
    LatencyUnit,
};
use tracing::Level;
use uuid::Uuid;

/// Default maximum request body size (16 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Request ID generator using UUIDs
#[derive(Clone, Default)]
pub struct UuidRequestIdGenerator;

impl MakeRequestId for UuidRequestIdGenerator {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Build trace layer
pub fn trace_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
        .make_span_with(
            DefaultMakeSpan::new()
                .include_headers(true)
                .level(Level::INFO),
        )
        .on_response(
            DefaultOnResponse::new()
                .include_headers(true)
                .latency_unit(LatencyUnit::Millis)
                .level(Level::INFO),
        )
}

/// CORS configuration options
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Allowed origins (empty means any)
    pub allowed_origins: Vec<String>,

    /// Whether to allow credentials
    pub allow_credentials: bool,

    /// Max age for preflight cache
    pub max_age_seconds: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![],
            allow_credentials: false,
            max_age_seconds: Some(3600),
        }
    }
}

impl CorsConfig {
    /// Build CORS layer from config
    pub fn into_layer(self) -> CorsLayer {
        // The registry is append-only; only reads and registrations are exposed
        let mut layer = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
            .expose_headers([header::CONTENT_TYPE, HeaderName::from_static("x-request-id")])
            .allow_credentials(self.allow_credentials);

        if self.allowed_origins.is_empty() {
            layer = layer.allow_origin(Any);
        } else {
            let origins: Vec<HeaderValue> = self
                .allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            layer = layer.allow_origin(origins);
        }

        if let Some(max_age) = self.max_age_seconds {
            layer = layer.max_age(std::time::Duration::from_secs(max_age));
        }

        layer
    }
}

/// Middleware configuration
#[derive(Debug, Clone)]
pub struct MiddlewareConfig {
    /// CORS configuration
    pub cors: CorsConfig,

    /// Enable request tracing
    pub enable_tracing: bool,

    /// Largest accepted request body; larger uploads get 413
    pub max_body_bytes: usize,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            cors: CorsConfig::default(),
            enable_tracing: true,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl MiddlewareConfig {
    /// Create a new middleware config
    pub fn new() -> Self {
        Self::default()
    }

    /// Set CORS config
    pub fn with_cors(mut self, cors: CorsConfig) -> Self {
        self.cors = cors;
        self
    }

    /// Enable/disable tracing
    pub fn with_tracing(mut self, enable: bool) -> Self {
        self.enable_tracing = enable;
        self
    }

    /// Set the request body limit
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }
}

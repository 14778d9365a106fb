//! CID Registry API Layer
//!
//! This crate provides the REST API for the CID Registry using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: Request handlers for all API endpoints
//! - **Routes**: Route definitions and router configuration
//! - **Middleware**: Tower middleware for tracing, CORS and request IDs
//! - **Error Handling**: Conversion of service errors to HTTP responses
//! - **Responses**: Standard response wrappers and types
//!
//! # Example
//!
//! ```rust,no_run
//! use cid_registry_api::build_api_server;
//! use cid_registry_service::ServiceRegistry;
//!
//! # async fn example(services: ServiceRegistry) -> std::io::Result<()> {
//! let app = build_api_server(services);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod responses;
pub mod routes;

// Re-export main types for convenience
pub use error::{ApiError, ApiJson, ApiResult, ErrorResponse};
pub use handlers::{AppState, ListParams, VersionInfo};
pub use middleware::{CorsConfig, MiddlewareConfig, UuidRequestIdGenerator, DEFAULT_MAX_BODY_BYTES};
pub use responses::{created, ok, ApiResponse, ComponentHealth, HealthResponse, HealthStatus};
pub use routes::build_router;

use axum::{extract::DefaultBodyLimit, Router};
use cid_registry_service::ServiceRegistry;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};

/// Build a complete API server with default middleware
pub fn build_api_server(services: ServiceRegistry) -> Router {
    build_api_server_with_config(services, MiddlewareConfig::default())
}

/// Build API server with custom middleware configuration
///
/// # Example
///
/// ```rust,no_run
/// use cid_registry_api::{build_api_server_with_config, CorsConfig, MiddlewareConfig};
/// use cid_registry_service::ServiceRegistry;
///
/// # fn example(services: ServiceRegistry) {
/// let middleware_config = MiddlewareConfig::new()
///     .with_cors(CorsConfig::default())
///     .with_max_body_bytes(4 * 1024 * 1024);
///
/// let app = build_api_server_with_config(services, middleware_config);
/// # }
/// ```
pub fn build_api_server_with_config(
    services: ServiceRegistry,
    middleware_config: MiddlewareConfig,
) -> Router {
    let state = AppState::new(services);
    let mut router = build_router(state)
        .layer(DefaultBodyLimit::max(middleware_config.max_body_bytes))
        .layer(middleware_config.cors.into_layer());

    if middleware_config.enable_tracing {
        router = router.layer(middleware::trace_layer());
    }

    router
        .layer(SetRequestIdLayer::x_request_id(UuidRequestIdGenerator))
        .layer(PropagateRequestIdLayer::x_request_id())
}

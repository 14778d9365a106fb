//! API request handlers
//!
//! HTTP request handlers for every API endpoint.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use cid_registry_core::Handle;
use cid_registry_service::{
    CountResponse, ListRecordsRequest, ListRecordsResponse, RegisterCidRequest,
    RegistrationResponse, ServiceError, ServiceRegistry, UploadResponse,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::{
    error::{ApiError, ApiJson, ApiResult},
    responses::{created, ok, ApiResponse, ComponentHealth, HealthResponse},
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Service registry
    pub services: Arc<ServiceRegistry>,
}

impl AppState {
    /// Create new application state
    pub fn new(services: ServiceRegistry) -> Self {
        Self {
            services: Arc::new(services),
        }
    }
}

// ============================================================================
// Registration Handlers
// ============================================================================

/// Register a CID
#[instrument(skip(state, request))]
pub async fn register_cid(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterCidRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<RegistrationResponse>>)> {
    let response = state
        .services
        .registration()
        .register(request)
        .await
        .map_err(ApiError::from)?;

    Ok(created(response))
}

/// Get the record for a handle
#[instrument(skip(state))]
pub async fn get_record(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> ApiResult<Json<ApiResponse<RegistrationResponse>>> {
    let handle = handle
        .parse::<Handle>()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let record = state
        .services
        .registration()
        .get_record(handle)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ServiceError::NotFound(format!("No record for handle {}", handle)))?;

    Ok(Json(ok(record)))
}

/// Query parameters for listing records
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// Only return records after this handle
    pub after: Option<u64>,

    /// Maximum number of records
    pub limit: Option<u64>,
}

/// List records in handle order
#[instrument(skip(state))]
pub async fn list_records(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ApiResponse<ListRecordsResponse>>> {
    let request = ListRecordsRequest {
        after: params.after.map(Handle::new),
        limit: params.limit,
    };

    let response = state
        .services
        .registration()
        .list_records(request)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(ok(response)))
}

/// Number of registrations
#[instrument(skip(state))]
pub async fn count_records(
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<CountResponse>>> {
    let response = state
        .services
        .registration()
        .count()
        .await
        .map_err(ApiError::from)?;

    Ok(Json(ok(response)))
}

// ============================================================================
// Upload Handlers
// ============================================================================

/// Upload a raw blob and register its CID
#[instrument(skip(state, body), fields(size = body.len()))]
pub async fn upload_blob(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<ApiResponse<UploadResponse>>)> {
    let upload = state.services.upload().ok_or_else(|| {
        ApiError::service_unavailable("No content store is configured", "STORE_UNAVAILABLE")
    })?;

    let response = upload
        .upload_and_register(&body)
        .await
        .map_err(ApiError::from)?;

    info!(handle = %response.handle, "Blob uploaded");
    Ok(created(response))
}

// ============================================================================
// Event Handlers
// ============================================================================

/// Stream registration events as server-sent events
///
/// Each event carries the handle as its id and the JSON event as its data.
/// Only events committed after the subscription starts are delivered.
#[instrument(skip(state))]
pub async fn stream_events(
    State(state): State<AppState>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    let feed = state.services.events().ok_or_else(|| {
        ApiError::service_unavailable("No event feed is configured", "FEED_UNAVAILABLE")
    })?;

    let events = feed.subscribe();
    info!(subscribers = feed.subscriber_count(), "Event subscriber connected");

    let stream = events.map(|event| {
        Event::default()
            .event(event.event_name())
            .id(event.handle().to_string())
            .json_data(&event)
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// ============================================================================
// Health Handlers
// ============================================================================

/// Health check endpoint
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> HealthResponse {
    debug!("Health check requested");

    let storage = state.services.registration().health().await;
    let storage_health = if storage.healthy {
        let mut health = ComponentHealth::healthy()
            .with_metric("backend", serde_json::json!(storage.backend));
        if let Some(count) = storage.record_count {
            health = health.with_metric("records", serde_json::json!(count));
        }
        health
    } else {
        ComponentHealth::unhealthy(
            storage
                .message
                .unwrap_or_else(|| format!("{} backend unavailable", storage.backend)),
        )
    };

    let mut response = HealthResponse::healthy()
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_check("storage", storage_health);

    if state.services.upload().is_some() {
        response = response.with_check("content_store", ComponentHealth::healthy());
    }

    response.compute_status()
}

// ============================================================================
// Version & Info Handlers
// ============================================================================

/// Get API version information
#[instrument]
pub async fn version_info() -> Json<ApiResponse<VersionInfo>> {
    let info = VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        api_version: "v1".to_string(),
        build_timestamp: option_env!("BUILD_TIMESTAMP")
            .unwrap_or("unknown")
            .to_string(),
    };

    Json(ok(info))
}

/// Version information
#[derive(Debug, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Semantic version
    pub version: String,

    /// API version
    pub api_version: String,

    /// Build timestamp
    pub build_timestamp: String,
}

//! API route definitions
//!
//! The route table exposes reads, registrations, uploads and the event feed
//! only; there is no route that updates or deletes a record.

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{
    count_records, get_record, health_check, list_records, register_cid, stream_events,
    upload_blob, version_info, AppState,
};

/// Build the API router with all routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health and info endpoints
        .route("/health", get(health_check))
        .route("/version", get(version_info))
        // API v1 routes
        .nest("/v1", build_v1_routes())
        .with_state(state)
}

/// Build v1 API routes
fn build_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/registrations", post(register_cid).get(list_records))
        .route("/registrations/count", get(count_records))
        .route("/registrations/{handle}", get(get_record))
        .route("/uploads", post(upload_blob))
        .route("/events", get(stream_events))
}

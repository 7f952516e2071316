//! Health check endpoint
//!
//! Provides a simple health check for monitoring and load balancers.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::handlers::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: &'static str,
    /// Model that answers chat turns
    pub model: String,
}

/// Health check handler
///
/// Returns 200 OK whenever the server is up. Provider reachability is not
/// checked; a broken credential already stops the server from starting.
pub async fn handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "OK",
            model: state.pipeline().model().to_string(),
        }),
    )
}

/// Health check endpoint
///
/// ```text
/// GET /api/health
/// ```
///
/// ```json
/// {
///   "success": true,
///   "data": {
///     "status": "healthy",
///     "version": "0.1.0",
///     "store": "connected",
///     "backend": "postgres"
///   }
/// }
/// ```
///
/// Answers 200 even when the store is unreachable; `status` then reads
/// `degraded`.

use axum::extract::State;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{app::AppState, response::ApiResponse};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// `connected` or `disconnected`
    pub store: String,
    pub backend: String,
}

pub async fn health_check(State(state): State<AppState>) -> ApiResponse<HealthResponse> {
    let connected = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Store health check failed");
            false
        }
    };

    let (status, store) = if connected {
        ("healthy", "connected")
    } else {
        ("degraded", "disconnected")
    };

    ApiResponse::ok(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: store.to_string(),
        backend: state.store.backend().to_string(),
    })
}

//! HTTP handlers for the REST API

use axum::Json;
#[cfg(feature = "metrics")]
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::instrument;
#[cfg(feature = "metrics")]
use tracing::error;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint
#[instrument]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Prometheus text exposition of the operator's metrics
#[cfg(feature = "metrics")]
pub async fn metrics() -> Result<String, StatusCode> {
    use prometheus_client::encoding::text::encode;

    let mut buffer = String::new();
    encode(&mut buffer, &crate::controller::metrics::REGISTRY).map_err(|e| {
        error!("Failed to encode metrics: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(buffer)
}

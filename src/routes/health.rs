use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use chrono::Utc;
use serde::Serialize;

use crate::db;
use crate::response::ApiResponse;
use crate::routes::method_not_allowed;
use crate::state::AppState;

const DB_PING_TIMEOUT: Duration = Duration::from_secs(5);

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(health))
        .route("/metrics", get(metrics))
        .route("/version", get(version))
        .method_not_allowed_fallback(method_not_allowed)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub uptime: u64,
    pub timestamp: String,
    pub environment: &'static str,
    pub version: String,
    pub database: &'static str,
}

// Liveness plus a bounded database ping; 503 while the pool is unusable
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let connected = match tokio::time::timeout(DB_PING_TIMEOUT, db::ping(&state.db)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!("Health check database ping failed: {}", e);
            false
        }
        Err(_) => {
            tracing::warn!("Health check database ping timed out");
            false
        }
    };

    let report = HealthReport {
        status: if connected { "ok" } else { "degraded" },
        uptime: state.metrics.uptime_seconds(),
        timestamp: Utc::now().to_rfc3339(),
        environment: state.config.app.environment.as_str(),
        version: state.config.server.api_version.clone(),
        database: if connected { "connected" } else { "disconnected" },
    };
    let status = if connected { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    ApiResponse::ok(report).with_status(status)
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    ApiResponse::ok(state.metrics.get_snapshot())
}

// Build info
pub async fn version(State(state): State<AppState>) -> impl IntoResponse {
    ApiResponse::ok(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "apiVersion": state.config.server.api_version,
        "build": {
            "profile": if cfg!(debug_assertions) { "debug" } else { "release" },
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        }
    }))
}

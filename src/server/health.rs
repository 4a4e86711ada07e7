//! Liveness, readiness and metrics endpoints.

use axum::extract::State;
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use super::{blocking, AppState};
use crate::error::{AppError, AppResult};
use crate::metrics::MetricsSnapshot;

#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub timestamp: String,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ReadyBody {
    pub status: &'static str,
    pub timestamp: String,
    pub data_dir_writable: bool,
}

fn now() -> String { Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true) }

/// `GET /health`
pub async fn health() -> Json<HealthBody> {
    Json(HealthBody { status: "healthy", timestamp: now(), version: env!("CARGO_PKG_VERSION") })
}

/// `GET /health/ready`: 503 when the data directory cannot be written.
pub async fn ready(State(state): State<AppState>) -> AppResult<Json<ReadyBody>> {
    let store = state.store.clone();
    let writable = blocking(move || Ok(store.probe_writable())).await?;
    if !writable {
        return Err(AppError::unavailable("not_ready", "Service not ready: data directory is not writable"));
    }
    Ok(Json(ReadyBody { status: "ready", timestamp: now(), data_dir_writable: true }))
}

/// `GET /metrics`
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> { Json(state.metrics.snapshot()) }

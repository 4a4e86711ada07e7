//! Per-request id, access log and metrics.

use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{info, Instrument};
use uuid::Uuid;

use super::{AppState, PROCESS_TIME_HEADER, REQUEST_ID_HEADER};
use crate::error::REQUEST_ID;

pub fn new_request_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

pub async fn track_request(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let request_id = new_request_id();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let span = tracing::info_span!("request", request_id = %request_id, method = %method, path = %path);
    let started = Instant::now();

    let mut resp = REQUEST_ID.scope(request_id.clone(), next.run(req)).instrument(span.clone()).await;

    let elapsed = started.elapsed();
    let status = resp.status().as_u16();
    state.metrics.record(method.as_str(), status);
    if let Ok(v) = HeaderValue::from_str(&request_id) { resp.headers_mut().insert(REQUEST_ID_HEADER, v); }
    if let Ok(v) = HeaderValue::from_str(&format!("{:.4}", elapsed.as_secs_f64())) { resp.headers_mut().insert(PROCESS_TIME_HEADER, v); }
    span.in_scope(|| info!(status, elapsed_ms = elapsed.as_millis() as u64, "{} {}", method, path));
    resp
}

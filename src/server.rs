//!
//! csvdata HTTP server
//! -------------------
//! Axum router exposing CSV datasets as REST resources.
//!
//! Responsibilities:
//! - Dataset listing, schema, row query/create/update/delete.
//! - Bulk create/update/delete, metadata, CSV/JSON export and CSV import.
//! - Health, readiness and request metrics.
//! - Request-id tagging, access logging and CORS.
//!
//! File work runs on the blocking pool; the dataset lock is taken there, never
//! on an async worker thread.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, Method, Uri};
use axum::routing::{get, post, put};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};
use crate::metrics::Metrics;
use crate::storage::Store;

pub mod bulk;
pub mod datasets;
pub mod health;
pub mod middleware;
pub mod rows;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const PROCESS_TIME_HEADER: &str = "x-process-time";

/// Uploads may be far larger than JSON bodies.
const IMPORT_BODY_LIMIT: usize = 64 * 1024 * 1024;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub config: Arc<ServerConfig>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Opens the store, creating the data and metadata directories.
    pub fn new(config: ServerConfig) -> AppResult<Self> {
        let store = Store::new(&config.data_dir, &config.metadata_dir)?.with_max_bulk_items(config.max_bulk_items);
        Ok(Self { store, config: Arc::new(config), metrics: Arc::new(Metrics::new()) })
    }
}

/// Run file-bound work off the async workers, inside the caller's span so
/// storage logs keep the request id.
pub async fn blocking<F, T>(work: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    let span = tracing::Span::current();
    tokio::task::spawn_blocking(move || span.in_scope(work)).await?
}

async fn route_not_found(uri: Uri) -> AppError {
    AppError::not_found("route_not_found".to_string(), format!("No route for {}", uri.path()))
}

async fn method_not_allowed(method: Method, uri: Uri) -> AppError {
    AppError::method_not_allowed("method_not_allowed".to_string(), format!("{} is not supported on {}", method, uri.path()))
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::ready))
        .route("/metrics", get(health::metrics))
        .route("/datasets", get(datasets::list))
        .route("/datasets/{name}/schema", get(datasets::schema))
        .route("/datasets/{name}/rows", get(rows::query).post(rows::create))
        .route("/datasets/{name}/rows/bulk", post(bulk::create).put(bulk::update).delete(bulk::delete))
        .route("/datasets/{name}/rows/{id}", put(rows::update).delete(rows::delete))
        .route("/datasets/{name}/metadata", get(datasets::get_metadata).put(datasets::put_metadata))
        .route("/datasets/{name}/export", get(datasets::export))
        .route("/datasets/{name}/import", post(datasets::import).layer(DefaultBodyLimit::max(IMPORT_BODY_LIMIT)))
        .fallback(route_not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::track_request))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER), HeaderName::from_static(PROCESS_TIME_HEADER)]);
    if config.cors_allows_any() { return base.allow_origin(Any); }
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("ignoring invalid CORS origin {:?}", o);
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(origins))
}

/// Serve on an already-bound listener until the process is interrupted.
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    axum::serve(listener, router(state)).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.bind, config.http_port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", config.bind, config.http_port))?;
    let state = AppState::new(config).map_err(anyhow::Error::from)?;
    log_startup_folders(&state);
    let listener = TcpListener::bind(addr).await.with_context(|| format!("binding {}", addr))?;
    info!("csvdata listening on http://{}", addr);
    serve(listener, state).await
}

fn log_startup_folders(state: &AppState) {
    info!("data dir: {}", state.store.data_dir().display());
    info!("metadata dir: {}", state.store.metadata_dir().display());
    match state.store.list_datasets() {
        Ok(list) => info!("datasets found: {}", list.len()),
        Err(e) => warn!("could not list datasets: {}", e),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Instrument;

    #[tokio::test]
    async fn blocking_work_runs_in_callers_span() {
        let _ = tracing::subscriber::set_global_default(tracing_subscriber::registry());
        let span = tracing::info_span!("request", request_id = "feedbeef");
        let expected = span.id();
        assert!(expected.is_some());
        let seen = blocking(|| Ok(tracing::Span::current().id())).instrument(span).await.unwrap();
        assert_eq!(seen, expected);
    }
}

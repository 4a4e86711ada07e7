//! Bulk row endpoints: one lock acquisition and one rewrite per request.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::{blocking, AppState};
use crate::dataset::{BulkCreated, BulkDeleted, BulkUpdated, RowPayload};
use crate::error::AppResult;

#[derive(Debug, Deserialize)]
pub struct BulkCreateRequest {
    pub rows: Vec<RowPayload>,
}

/// Each entry must carry the target row's `id`.
#[derive(Debug, Deserialize)]
pub struct BulkUpdateRequest {
    pub updates: Vec<RowPayload>,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<String>,
}

/// `POST /datasets/{name}/rows/bulk`
pub async fn create(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<BulkCreateRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<BulkCreated>)> {
    let Path(name) = path?;
    let Json(req) = body?;
    let dataset = state.store.dataset(&name)?;
    let out = blocking(move || dataset.bulk_create(req.rows)).await?;
    Ok((StatusCode::CREATED, Json(out)))
}

/// `PUT /datasets/{name}/rows/bulk`
pub async fn update(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<BulkUpdateRequest>, JsonRejection>,
) -> AppResult<Json<BulkUpdated>> {
    let Path(name) = path?;
    let Json(req) = body?;
    let dataset = state.store.dataset(&name)?;
    let out = blocking(move || dataset.bulk_update(req.updates)).await?;
    Ok(Json(out))
}

/// `DELETE /datasets/{name}/rows/bulk`
pub async fn delete(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<BulkDeleteRequest>, JsonRejection>,
) -> AppResult<Json<BulkDeleted>> {
    let Path(name) = path?;
    let Json(req) = body?;
    let dataset = state.store.dataset(&name)?;
    let out = blocking(move || dataset.bulk_delete(req.ids)).await?;
    Ok(Json(out))
}

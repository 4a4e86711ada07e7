//! Single-row endpoints and the paginated row query.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{OriginalUri, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use super::{blocking, AppState};
use crate::dataset::RowPayload;
use crate::error::AppResult;
use crate::query::{self, LinkBase, QueryPage, QueryParams, RowQuery};
use crate::storage::Record;

/// `GET /datasets/{name}/rows`
pub async fn query(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    OriginalUri(uri): OriginalUri,
    params: Result<Query<QueryParams>, QueryRejection>,
) -> AppResult<Json<QueryPage>> {
    let Path(name) = path?;
    let Query(params) = params?;
    let row_query = RowQuery::from_params(params, state.config.default_page_limit, state.config.max_page_limit)?;
    let dataset = state.store.dataset(&name)?;
    let base = LinkBase::new(uri.path(), uri.query());
    let page = blocking(move || {
        let table = dataset.load()?;
        Ok(query::run_query(table, &row_query, &base))
    })
    .await?;
    Ok(Json(page))
}

/// `POST /datasets/{name}/rows`
pub async fn create(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<RowPayload>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Record>)> {
    let Path(name) = path?;
    let Json(payload) = body?;
    let dataset = state.store.dataset(&name)?;
    let record = blocking(move || dataset.create_row(payload)).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// `PUT /datasets/{name}/rows/{id}`
pub async fn update(
    State(state): State<AppState>,
    path: Result<Path<(String, String)>, PathRejection>,
    body: Result<Json<RowPayload>, JsonRejection>,
) -> AppResult<Json<Record>> {
    let Path((name, id)) = path?;
    let Json(payload) = body?;
    let dataset = state.store.dataset(&name)?;
    let record = blocking(move || dataset.update_row(&id, payload)).await?;
    Ok(Json(record))
}

/// `DELETE /datasets/{name}/rows/{id}`
pub async fn delete(State(state): State<AppState>, path: Result<Path<(String, String)>, PathRejection>) -> AppResult<StatusCode> {
    let Path((name, id)) = path?;
    let dataset = state.store.dataset(&name)?;
    blocking(move || dataset.delete_row(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

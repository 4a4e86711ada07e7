//! Dataset-level endpoints: listing, schema, metadata, export and import.

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{blocking, AppState};
use crate::dataset::{ImportMode, ImportOutcome};
use crate::error::{AppError, AppResult};
use crate::storage::metadata::{DatasetMetadata, MetadataUpdate};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl std::str::FromStr for ExportFormat {
    type Err = AppError;
    fn from_str(s: &str) -> AppResult<Self> {
        match s {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(AppError::validation("invalid_format".to_string(), format!("Unknown export format: {}", other))
                .with_detail("format must be one of: csv, json")),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportParams {
    pub format: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ImportParams {
    pub mode: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SchemaBody {
    pub columns: Vec<String>,
}

/// `GET /datasets`
pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    let store = state.store.clone();
    Ok(Json(blocking(move || store.list_datasets()).await?))
}

/// `GET /datasets/{name}/schema`
pub async fn schema(State(state): State<AppState>, path: Result<Path<String>, PathRejection>) -> AppResult<Json<SchemaBody>> {
    let Path(name) = path?;
    let dataset = state.store.dataset(&name)?;
    let columns = blocking(move || dataset.schema()).await?;
    Ok(Json(SchemaBody { columns }))
}

/// `GET /datasets/{name}/metadata`
pub async fn get_metadata(State(state): State<AppState>, path: Result<Path<String>, PathRejection>) -> AppResult<Json<DatasetMetadata>> {
    let Path(name) = path?;
    let dataset = state.store.dataset(&name)?;
    Ok(Json(blocking(move || dataset.metadata()).await?))
}

/// `PUT /datasets/{name}/metadata`
pub async fn put_metadata(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<MetadataUpdate>, JsonRejection>,
) -> AppResult<Json<DatasetMetadata>> {
    let Path(name) = path?;
    let Json(update) = body?;
    let dataset = state.store.dataset(&name)?;
    Ok(Json(blocking(move || dataset.update_metadata(&update)).await?))
}

/// `GET /datasets/{name}/export?format=csv|json`
pub async fn export(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    params: Result<Query<ExportParams>, QueryRejection>,
) -> AppResult<Response> {
    let Path(name) = path?;
    let Query(params) = params?;
    let format: ExportFormat = match params.format.as_deref() {
        None => ExportFormat::Csv,
        Some(f) => f.parse()?,
    };
    let dataset = state.store.dataset(&name)?;
    match format {
        ExportFormat::Json => {
            let table = blocking(move || dataset.load()).await?;
            Ok(Json(table).into_response())
        }
        ExportFormat::Csv => {
            let file_name = dataset.file_name();
            let bytes = blocking(move || dataset.raw_bytes()).await?;
            let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file_name))
                .map_err(|e| AppError::internal("header_error".to_string(), e.to_string()))?;
            let headers = [
                (header::CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8")),
                (header::CONTENT_DISPOSITION, disposition),
            ];
            Ok((headers, bytes).into_response())
        }
    }
}

/// `POST /datasets/{name}/import?mode=append|replace`, multipart field `file`.
pub async fn import(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    params: Result<Query<ImportParams>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<ImportOutcome>> {
    let Path(name) = path?;
    let mut multipart = multipart?;
    let Query(params) = params?;
    let mode: ImportMode = match params.mode.as_deref() {
        None => ImportMode::Append,
        Some(m) => m.parse()?,
    };
    let dataset = state.store.dataset(&name)?;
    let mut upload: Option<Vec<u8>> = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            debug!(target: "csvdata::dataset", "ignoring multipart field {:?}", field.name());
            continue;
        }
        upload = Some(field.bytes().await?.to_vec());
        break;
    }
    let bytes = upload.ok_or_else(|| AppError::validation("missing_file", "Multipart upload must include a 'file' field"))?;
    Ok(Json(blocking(move || dataset.import(&bytes, mode)).await?))
}

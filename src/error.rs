//! Unified application error model and mapping helpers.
//! Every failure that leaves the core carries a machine-checkable `code` and a
//! human-readable `message`; the HTTP layer renders it through `IntoResponse`.

use axum::extract::multipart::MultipartError;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use tracing::{error, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    InvalidName { code: String, message: String },
    NotFound { code: String, message: String },
    Validation { code: String, message: String, #[serde(default)] details: Vec<String> },
    Conflict { code: String, message: String },
    MethodNotAllowed { code: String, message: String },
    UnsupportedEncoding { code: String, message: String },
    Unavailable { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::InvalidName { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Validation { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::MethodNotAllowed { code, .. }
            | AppError::UnsupportedEncoding { code, .. }
            | AppError::Unavailable { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::InvalidName { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Validation { message, .. }
            | AppError::Conflict { message, .. }
            | AppError::MethodNotAllowed { message, .. }
            | AppError::UnsupportedEncoding { message, .. }
            | AppError::Unavailable { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn invalid_name<S: Into<String>>(code: S, msg: S) -> Self { AppError::InvalidName { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn validation<S: Into<String>>(code: S, msg: S) -> Self { AppError::Validation { code: code.into(), message: msg.into(), details: Vec::new() } }
    pub fn conflict<S: Into<String>>(code: S, msg: S) -> Self { AppError::Conflict { code: code.into(), message: msg.into() } }
    pub fn method_not_allowed<S: Into<String>>(code: S, msg: S) -> Self { AppError::MethodNotAllowed { code: code.into(), message: msg.into() } }
    pub fn encoding<S: Into<String>>(code: S, msg: S) -> Self { AppError::UnsupportedEncoding { code: code.into(), message: msg.into() } }
    pub fn unavailable<S: Into<String>>(code: S, msg: S) -> Self { AppError::Unavailable { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    pub fn dataset_not_found(name: &str) -> Self {
        AppError::not_found("dataset_not_found".to_string(), format!("Dataset not found: {}", name))
    }

    pub fn row_not_found(id: &str) -> Self {
        AppError::not_found("row_not_found".to_string(), format!("Row with id not found: {}", id))
    }

    /// Attach a structured detail line; no-op for variants other than `Validation`.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        if let AppError::Validation { details, .. } = &mut self { details.push(detail.into()); }
        self
    }

    pub fn details(&self) -> &[String] {
        match self {
            AppError::Validation { details, .. } => details.as_slice(),
            _ => &[],
        }
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::InvalidName { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::Validation { .. } => 422,
            AppError::Conflict { .. } => 409,
            AppError::MethodNotAllowed { .. } => 405,
            AppError::UnsupportedEncoding { .. } => 400,
            AppError::Unavailable { .. } => 503,
            AppError::Internal { .. } => 500,
        }
    }

    pub fn is_client_error(&self) -> bool { self.http_status() < 500 }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

tokio::task_local! {
    /// Correlation id of the request currently being served.
    pub static REQUEST_ID: String;
}

pub fn current_request_id() -> Option<String> { REQUEST_ID.try_with(|id| id.clone()).ok() }

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    status: u16,
    message: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        // Internal detail goes to the log only
        let message = match &self {
            AppError::Internal { .. } => {
                error!(code = self.code_str(), "internal error: {}", self.message());
                "internal server error"
            }
            AppError::Unavailable { .. } => {
                warn!(code = self.code_str(), "unavailable: {}", self.message());
                self.message()
            }
            _ => {
                warn!(code = self.code_str(), status = status.as_u16(), "{}", self.message());
                self.message()
            }
        };
        let body = ErrorBody { code: self.code_str(), status: status.as_u16(), message, details: self.details().to_vec(), request_id: current_request_id() };
        (status, Json(serde_json::json!({ "error": body }))).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal { code: "io_error".into(), message: err.to_string() }
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Internal { code: "csv_error".into(), message: err.to_string() }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal { code: "json_error".into(), message: err.to_string() }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal { code: "task_failed".into(), message: err.to_string() }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Default mapping: treat as Internal unless downcasted elsewhere
        match err.downcast::<AppError>() {
            Ok(app) => app,
            Err(other) => AppError::Internal { code: "internal_error".into(), message: other.to_string() },
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rej: JsonRejection) -> Self {
        AppError::validation("validation_error", "Request body is not a valid payload").with_detail(rej.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rej: QueryRejection) -> Self {
        AppError::validation("validation_error", "Invalid query parameters").with_detail(rej.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rej: PathRejection) -> Self {
        AppError::validation("validation_error", "Invalid path parameters").with_detail(rej.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rej: MultipartRejection) -> Self {
        AppError::validation("validation_error", "Import expects a multipart/form-data body").with_detail(rej.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::validation("validation_error", "Malformed multipart upload").with_detail(err.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AppError::invalid_name("invalid_name", "bad").http_status(), 400);
        assert_eq!(AppError::not_found("dataset_not_found", "missing").http_status(), 404);
        assert_eq!(AppError::validation("validation_error", "oops").http_status(), 422);
        assert_eq!(AppError::conflict("duplicate_id", "dup").http_status(), 409);
        assert_eq!(AppError::method_not_allowed("method_not_allowed", "no").http_status(), 405);
        assert_eq!(AppError::encoding("unsupported_encoding", "latin1").http_status(), 400);
        assert_eq!(AppError::unavailable("not_ready", "ro").http_status(), 503);
        assert_eq!(AppError::internal("internal_error", "panic").http_status(), 500);
    }

    #[test]
    fn details_only_attach_to_validation() {
        let v = AppError::validation("bulk_too_large", "too many").with_detail("rows: 1001 > 1000");
        assert_eq!(v.details(), &["rows: 1001 > 1000".to_string()]);
        let nf = AppError::row_not_found("abc").with_detail("ignored");
        assert!(nf.details().is_empty());
        assert_eq!(nf.code_str(), "row_not_found");
    }

    #[test]
    fn anyhow_roundtrip_preserves_app_error() {
        let err: anyhow::Error = AppError::dataset_not_found("users").into();
        let back = AppError::from(err);
        assert_eq!(back.code_str(), "dataset_not_found");
        let other = AppError::from(anyhow::anyhow!("disk on fire"));
        assert_eq!(other.http_status(), 500);
    }

    async fn rendered(err: AppError) -> (u16, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status().as_u16();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn internal_detail_stays_out_of_the_body() {
        let (status, body) = rendered(AppError::internal("io_error", "secret path /var/csv/users.csv")).await;
        assert_eq!(status, 500);
        assert_eq!(body["error"]["code"], "io_error");
        assert_eq!(body["error"]["message"], "internal server error");
        assert!(!body.to_string().contains("secret path"));
    }

    #[tokio::test]
    async fn body_carries_request_id_inside_scope() {
        let (status, body) = REQUEST_ID
            .scope("abcd1234".to_string(), rendered(AppError::validation("invalid_limit", "limit out of range").with_detail("limit: 0")))
            .await;
        assert_eq!(status, 422);
        assert_eq!(body["error"]["message"], "limit out of range");
        assert_eq!(body["error"]["details"][0], "limit: 0");
        assert_eq!(body["error"]["request_id"], "abcd1234");
        let (_, outside) = rendered(AppError::row_not_found("x")).await;
        assert!(outside["error"].get("request_id").is_none());
    }

    #[test]
    fn display_includes_code_and_message() {
        let e = AppError::invalid_name("invalid_name", "nope");
        assert_eq!(e.to_string(), "invalid_name: nope");
        assert!(e.is_client_error());
        assert!(!AppError::internal("x", "y").is_client_error());
    }
}

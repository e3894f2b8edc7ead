use crate::services::storage::StorageError;
use crate::services::upload_service::UploadError;
use crate::utils::validation::ValidationError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Storage(e) => {
                tracing::error!("Storage error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Body of every failed `POST /upload`.
#[derive(Serialize, ToSchema)]
pub struct UploadErrorResponse {
    pub success: bool,
    /// Human-readable message, shown to the user as-is
    pub error: String,
    /// Stable reason code: no_file, multiple_files, wrong_type, size_exceeded, storage_failed
    pub code: String,
}

/// Upload pipeline failure rendered as `{success:false, error, code}`.
#[derive(Debug)]
pub struct UploadFailure(pub UploadError);

impl From<UploadError> for UploadFailure {
    fn from(err: UploadError) -> Self {
        Self(err)
    }
}

impl From<ValidationError> for UploadFailure {
    fn from(err: ValidationError) -> Self {
        Self(UploadError::ValidationFailed(err))
    }
}

impl UploadFailure {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            UploadError::NoFile | UploadError::MultipleFiles => StatusCode::BAD_REQUEST,
            UploadError::ValidationFailed(ValidationError::WrongType) => StatusCode::BAD_REQUEST,
            UploadError::ValidationFailed(ValidationError::SizeExceeded { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            UploadError::StorageFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for UploadFailure {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = UploadErrorResponse {
            success: false,
            error: self.0.to_string(),
            code: self.0.code().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

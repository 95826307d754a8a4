use axum::{Json,
    http::StatusCode,
    response::IntoResponse
};
use serde::Serialize;
use thiserror::Error;

use crate::{storage::HostError, store::StoreError};

/// What went wrong underneath a failed operation.
#[derive(Debug, Error)]
pub enum Cause {
    #[error(transparent)]
    Upstream(#[from] HostError),

    #[error(transparent)]
    Persistence(#[from] StoreError),
}

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("No file uploaded")]
    NoFile,

    #[error("Invalid file: {0}")]
    InvalidFile(String),

    #[error("Failed to parse multipart form: {0}")]
    Multipart(String),

    #[error("File exceeds maximum limit of {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    #[error("Unable to check media host storage usage")]
    QuotaUnavailable(#[source] HostError),

    #[error("Media host storage limit reached")]
    QuotaExceeded { used: u64, limit: u64 },

    #[error("File not found")]
    NotFound,

    #[error("Upload failed")]
    UploadFailed(#[source] Cause),

    #[error("Failed to serve file")]
    FetchFailed(#[source] Cause),

    #[error("Failed to delete file")]
    DeleteFailed(#[source] Cause),

    #[error("Failed to get files")]
    ListFailed(#[source] Cause),

    #[error("Failed to clear files")]
    ClearFailed(#[source] Cause),
}

/// JSON body returned for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NoFile
            | AppError::InvalidFile(_)
            | AppError::Multipart(_)
            | AppError::QuotaUnavailable(_)
            | AppError::QuotaExceeded { .. } => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::UploadFailed(_)
            | AppError::FetchFailed(_)
            | AppError::DeleteFailed(_)
            | AppError::ListFailed(_)
            | AppError::ClearFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text of the underlying failure, if any.
    fn cause_text(&self) -> Option<String> {
        match self {
            AppError::QuotaUnavailable(e) => Some(e.to_string()),
            AppError::UploadFailed(c)
            | AppError::FetchFailed(c)
            | AppError::DeleteFailed(c)
            | AppError::ListFailed(c)
            | AppError::ClearFailed(c) => Some(c.to_string()),
            _ => None,
        }
    }
}

/// Convert `AppError` into an HTTP response.
impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let error = self.cause_text();

        if status.is_server_error() {
            tracing::error!("{}: {}", self, error.as_deref().unwrap_or("no cause"));
        }

        // Return standardized JSON error response
        let body = Json(ErrorBody {
            success: false,
            message: self.to_string(),
            error,
        });
        (status, body).into_response()
    }
}

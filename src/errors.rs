use crate::services::{export_formatter::ExportError, multipart_decoder::DecodeError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::io;
use thiserror::Error;

const GENERIC_FAILURE: &str = "Internal server error";

/// Every failure a handler can surface.
///
/// Client errors carry a short message that is safe to return. Internal
/// errors are logged in full and answered with a generic 500.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Method not allowed")]
    UnsupportedMethod,
    #[error("No file received")]
    NoFilePresent,
    #[error("Malformed multipart body: {0}")]
    MalformedMultipart(String),
    #[error("Payload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: u64 },
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("Invalid request body: {0}")]
    InvalidBody(String),
    #[error("Unknown export format `{0}`")]
    UnknownExportFormat(String),
    #[error("formatting failed: {0}")]
    FormattingFailure(String),
    #[error("i/o failure: {0}")]
    InternalIO(#[from] io::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::UnsupportedMethod => StatusCode::METHOD_NOT_ALLOWED,
            AppError::NoFilePresent
            | AppError::MalformedMultipart(_)
            | AppError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::UnsupportedFileType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::UnknownExportFormat(_) => StatusCode::NOT_FOUND,
            AppError::FormattingFailure(_) | AppError::InternalIO(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn is_internal(&self) -> bool {
        self.status().is_server_error()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if self.is_internal() {
            tracing::error!(error = ?self, "request failed");
            let body = Json(json!({
                "error": GENERIC_FAILURE,
                "status": status.as_u16()
            }));
            return (status, body).into_response();
        }

        tracing::debug!(status = status.as_u16(), "rejected request: {}", self);
        if matches!(self, AppError::UnsupportedMethod) {
            return status.into_response();
        }

        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16()
        }));
        (status, body).into_response()
    }
}

impl From<DecodeError> for AppError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Malformed(reason) => AppError::MalformedMultipart(reason),
            DecodeError::PayloadTooLarge { limit } => AppError::PayloadTooLarge { limit },
            DecodeError::DisallowedExtension { filename } => AppError::UnsupportedFileType(filename),
            DecodeError::Io(err) => AppError::InternalIO(err),
        }
    }
}

impl From<ExportError> for AppError {
    fn from(err: ExportError) -> Self {
        AppError::FormattingFailure(err.to_string())
    }
}

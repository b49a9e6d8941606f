//! HTTP handlers for result export.
//! The request body is the result record; the response is the rendered file.

use crate::{
    errors::AppError,
    models::export::{ExportArtifact, ExportFormat, ResultRecord},
    state::AppState,
};
use axum::{
    body::{Body, Bytes},
    extract::{Path, State, rejection::BytesRejection},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use serde_json::Value;

/// `POST /api/export/{format}`: `format` is `json` or `csv`.
pub async fn export_record(
    State(state): State<AppState>,
    Path(format): Path<String>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, AppError> {
    let format: ExportFormat = format.parse().map_err(AppError::UnknownExportFormat)?;
    let body = body.map_err(|rej| {
        if rej.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge {
                limit: state.config.max_export_bytes,
            }
        } else {
            tracing::debug!("export body rejected: {}", rej.body_text());
            AppError::InvalidBody("could not be read".into())
        }
    })?;

    let record = parse_record(&body)?;
    let artifact = state.formatter.format(&record, format)?;
    tracing::info!(
        format = %format,
        keys = record.len(),
        bytes = artifact.bytes.len(),
        "export rendered"
    );

    artifact_response(artifact)
}

/// The body must be a JSON object; anything else is the caller's fault.
fn parse_record(body: &[u8]) -> Result<ResultRecord, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::InvalidBody("No data provided".into()));
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(record)) => Ok(record),
        Ok(_) => Err(AppError::InvalidBody("not a JSON object".into())),
        Err(err) => {
            tracing::debug!("export body is not JSON: {}", err);
            Err(AppError::InvalidBody("not valid JSON".into()))
        }
    }
}

fn artifact_response(artifact: ExportArtifact) -> Result<Response, AppError> {
    let disposition = HeaderValue::from_str(&artifact.content_disposition())
        .map_err(|err| AppError::FormattingFailure(err.to_string()))?;
    let content_type = HeaderValue::from_str(&artifact.content_type)
        .map_err(|err| AppError::FormattingFailure(err.to_string()))?;
    let length = HeaderValue::from(artifact.bytes.len());

    let mut response = Response::new(Body::from(artifact.bytes));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    headers.insert(header::CONTENT_LENGTH, length);
    Ok(response)
}

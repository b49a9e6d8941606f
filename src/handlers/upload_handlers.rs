//! HTTP handlers for document upload.
//! File parts are streamed to per-request scratch space by the
//! `MultipartDecoder`; the handler only picks the document and acknowledges it.

use crate::{errors::AppError, models::upload::UploadResult, state::AppState};
use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
};

/// `POST /api/upload`
///
/// Picks the document by field priority (`file`, `upload`, then the first
/// file part) and returns its original name and size. Scratch storage is
/// released before the response is sent, on every path.
pub async fn upload_document(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResult>, AppError> {
    let multipart = multipart.map_err(|rej| {
        tracing::debug!("multipart extraction rejected: {}", rej.body_text());
        AppError::MalformedMultipart("expected multipart/form-data with a boundary".into())
    })?;
    let form = state.decoder.decode(multipart).await?;

    let Some(part) = form.primary_file() else {
        tracing::debug!(fields = form.fields().len(), "upload carried no file part");
        return Err(AppError::NoFilePresent);
    };

    let result = UploadResult::accepted(part);
    tracing::info!(
        field = %part.field_name,
        filename = %result.original_filename,
        mime_type = %part.mime_type,
        size_bytes = result.size_bytes,
        "upload accepted"
    );

    if let Err(err) = form.release() {
        tracing::warn!("failed to release upload scratch space: {}", err);
    }

    Ok(Json(result))
}

/// Any verb other than `POST`/`OPTIONS` on an API route.
pub async fn method_not_allowed() -> AppError {
    AppError::UnsupportedMethod
}

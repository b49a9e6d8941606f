//! Multipart sections and the upload acknowledgment.

use serde::Serialize;
use std::path::PathBuf;

/// One file section of a decoded multipart body.
///
/// The content lives on disk inside the scratch directory of the
/// `DecodedForm` that produced it, so a part never outlives its request.
#[derive(Debug, Clone)]
pub struct UploadedPart {
    /// Form field the part was submitted under.
    pub field_name: String,

    /// Filename exactly as the client sent it.
    pub original_filename: Option<String>,

    /// Declared MIME type (`application/octet-stream` when absent).
    pub mime_type: String,

    /// Number of content bytes written to disk.
    pub size_bytes: u64,

    /// Scratch file holding the content.
    pub path: PathBuf,
}

/// Body of a successful `POST /api/upload`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub message: String,
    pub original_filename: String,
    pub size_bytes: u64,
}

impl UploadResult {
    pub fn accepted(part: &UploadedPart) -> Self {
        Self {
            message: "Upload successful".into(),
            original_filename: part.original_filename.clone().unwrap_or_default(),
            size_bytes: part.size_bytes,
        }
    }
}

//! src/services/multipart_decoder.rs
//!
//! MultipartDecoder: streams a `multipart/form-data` body into a
//! per-request scratch directory. File parts are written chunk by chunk
//! beneath `scratch_root/upload-XXXX/{uuid}.{ext}`; text parts are kept in
//! memory. The scratch directory belongs to the returned `DecodedForm` and is
//! deleted when that value is dropped, so every exit path (success, error,
//! cancelled request) releases it.

use crate::{config::AppConfig, models::upload::UploadedPart};
use axum::{
    extract::{Multipart, multipart::MultipartError},
    http::StatusCode,
};
use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};
use tempfile::TempDir;
use thiserror::Error;
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::debug;
use uuid::Uuid;

/// Field names tried, in order, when picking the uploaded document.
/// When none matches, the first file part in the body wins.
pub const FILE_FIELD_PRIORITY: [&str; 2] = ["file", "upload"];

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";
const UNPARSEABLE_BODY: &str = "body could not be parsed";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed multipart body: {0}")]
    Malformed(String),
    #[error("multipart body exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: u64 },
    #[error("file `{filename}` has a disallowed extension")]
    DisallowedExtension { filename: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type DecodeResult<T> = Result<T, DecodeError>;

/// Decoder settings shared by every request.
#[derive(Clone, Debug)]
pub struct MultipartDecoder {
    scratch_root: PathBuf,
    max_bytes: u64,
    /// Empty means every extension is accepted.
    allowed_extensions: Arc<Vec<String>>,
}

/// Result of decoding one request body.
///
/// Owns the scratch directory its file parts point into.
#[derive(Debug)]
pub struct DecodedForm {
    fields: HashMap<String, String>,
    files: Vec<UploadedPart>,
    scratch: TempDir,
}

impl MultipartDecoder {
    pub fn new(
        scratch_root: impl Into<PathBuf>,
        max_bytes: u64,
        allowed_extensions: Vec<String>,
    ) -> Self {
        Self {
            scratch_root: scratch_root.into(),
            max_bytes,
            allowed_extensions: Arc::new(allowed_extensions),
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.scratch_dir.clone(),
            cfg.max_upload_bytes,
            cfg.allowed_extensions.clone(),
        )
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn scratch_root(&self) -> &Path {
        &self.scratch_root
    }

    /// Decode every part of `multipart`.
    ///
    /// - File parts (those with a `filename`) are streamed to disk.
    /// - Parts with an empty filename are drained and ignored.
    /// - Text parts must be UTF-8.
    /// - Content bytes of all parts count against `max_bytes`.
    ///
    /// Disallowed extensions are rejected before any of their bytes are
    /// written.
    pub async fn decode(&self, mut multipart: Multipart) -> DecodeResult<DecodedForm> {
        let scratch = tempfile::Builder::new()
            .prefix("upload-")
            .tempdir_in(&self.scratch_root)?;
        let mut fields = HashMap::new();
        let mut files = Vec::new();
        let mut total: u64 = 0;

        while let Some(mut field) = multipart
            .next_field()
            .await
            .map_err(|err| self.multipart_error(err))?
        {
            let field_name = field
                .name()
                .map(str::to_string)
                .ok_or_else(|| DecodeError::Malformed("part is missing a field name".into()))?;
            let file_name = field.file_name().map(str::to_string);

            match file_name {
                Some(filename) if filename.is_empty() => {
                    debug!("skipping empty file part `{}`", field_name);
                    while let Some(chunk) =
                        field.chunk().await.map_err(|err| self.multipart_error(err))?
                    {
                        total = self.account(total, chunk.len())?;
                    }
                }
                Some(filename) => {
                    let extension = self.ensure_extension_allowed(&filename)?;
                    let mime_type = field
                        .content_type()
                        .map(str::to_string)
                        .unwrap_or_else(|| DEFAULT_MIME_TYPE.into());
                    let path = scratch.path().join(match &extension {
                        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
                        None => Uuid::new_v4().to_string(),
                    });

                    let mut file = File::create(&path).await?;
                    let mut size_bytes: u64 = 0;
                    while let Some(chunk) =
                        field.chunk().await.map_err(|err| self.multipart_error(err))?
                    {
                        total = self.account(total, chunk.len())?;
                        size_bytes += chunk.len() as u64;
                        file.write_all(&chunk).await?;
                    }
                    file.flush().await?;

                    debug!(
                        "decoded file part `{}` ({}, {} bytes) -> {}",
                        field_name,
                        filename,
                        size_bytes,
                        path.display()
                    );
                    files.push(UploadedPart {
                        field_name,
                        original_filename: Some(filename),
                        mime_type,
                        size_bytes,
                        path,
                    });
                }
                None => {
                    let mut raw = Vec::new();
                    while let Some(chunk) =
                        field.chunk().await.map_err(|err| self.multipart_error(err))?
                    {
                        total = self.account(total, chunk.len())?;
                        raw.extend_from_slice(&chunk);
                    }
                    let value = String::from_utf8(raw).map_err(|_| {
                        DecodeError::Malformed(format!("field `{}` is not valid UTF-8", field_name))
                    })?;
                    fields.insert(field_name, value);
                }
            }
        }

        Ok(DecodedForm {
            fields,
            files,
            scratch,
        })
    }

    /// Add `len` to the running total, failing once it passes the cap.
    fn account(&self, total: u64, len: usize) -> DecodeResult<u64> {
        let total = total + len as u64;
        if total > self.max_bytes {
            return Err(DecodeError::PayloadTooLarge {
                limit: self.max_bytes,
            });
        }
        Ok(total)
    }

    fn ensure_extension_allowed(&self, filename: &str) -> DecodeResult<Option<String>> {
        let extension = extension_of(filename);
        if self.allowed_extensions.is_empty() {
            return Ok(extension);
        }
        let allowed = extension
            .as_ref()
            .is_some_and(|ext| self.allowed_extensions.iter().any(|allowed| allowed == ext));
        if !allowed {
            return Err(DecodeError::DisallowedExtension {
                filename: filename.to_string(),
            });
        }
        Ok(extension)
    }

    fn multipart_error(&self, err: MultipartError) -> DecodeError {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            DecodeError::PayloadTooLarge {
                limit: self.max_bytes,
            }
        } else {
            debug!("multipart parse error: {}", err.body_text());
            DecodeError::Malformed(UNPARSEABLE_BODY.into())
        }
    }
}

impl DecodedForm {
    /// Scalar value of a non-file field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn fields(&self) -> &HashMap<String, String> {
        &self.fields
    }

    /// File parts in the order they appeared in the body.
    pub fn files(&self) -> &[UploadedPart] {
        &self.files
    }

    /// File parts grouped by field name.
    pub fn files_by_field(&self) -> HashMap<&str, Vec<&UploadedPart>> {
        let mut grouped: HashMap<&str, Vec<&UploadedPart>> = HashMap::new();
        for part in &self.files {
            grouped.entry(part.field_name.as_str()).or_default().push(part);
        }
        grouped
    }

    /// The uploaded document: first part named after `FILE_FIELD_PRIORITY`,
    /// else the first file part present.
    pub fn primary_file(&self) -> Option<&UploadedPart> {
        FILE_FIELD_PRIORITY
            .iter()
            .find_map(|name| self.files.iter().find(|part| part.field_name == *name))
            .or_else(|| self.files.first())
    }

    pub fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }

    /// Delete the scratch directory now and report failures.
    /// Dropping the form does the same silently.
    pub fn release(self) -> io::Result<()> {
        self.scratch.close()
    }
}

/// Lowercased extension after the last dot, if any.
fn extension_of(filename: &str) -> Option<String> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            Some(ext.to_ascii_lowercase())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        extract::FromRequest,
        http::{Request, header},
    };

    const BOUNDARY: &str = "sof-test-boundary";

    struct Part<'a> {
        name: &'a str,
        filename: Option<&'a str>,
        content_type: Option<&'a str>,
        body: &'a [u8],
    }

    fn body_for(parts: &[Part<'_>]) -> Vec<u8> {
        let mut out = Vec::new();
        for part in parts {
            out.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
            if let Some(filename) = part.filename {
                disposition.push_str(&format!("; filename=\"{}\"", filename));
            }
            out.extend_from_slice(disposition.as_bytes());
            out.extend_from_slice(b"\r\n");
            if let Some(ct) = part.content_type {
                out.extend_from_slice(format!("Content-Type: {}\r\n", ct).as_bytes());
            }
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(part.body);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        out
    }

    async fn multipart_for(parts: &[Part<'_>]) -> Multipart {
        multipart_from_raw(body_for(parts)).await
    }

    async fn multipart_from_raw(body: Vec<u8>) -> Multipart {
        let req = Request::builder()
            .method("POST")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();
        Multipart::from_request(req, &()).await.unwrap()
    }

    fn decoder(root: &Path, max_bytes: u64) -> MultipartDecoder {
        MultipartDecoder::new(
            root,
            max_bytes,
            vec!["pdf".into(), "png".into(), "docx".into()],
        )
    }

    fn entries(root: &Path) -> usize {
        std::fs::read_dir(root).unwrap().count()
    }

    #[tokio::test]
    async fn decodes_files_and_fields() {
        let root = TempDir::new().unwrap();
        let multipart = multipart_for(&[
            Part {
                name: "note",
                filename: None,
                content_type: None,
                body: b"berth 4",
            },
            Part {
                name: "file",
                filename: Some("Statement Of Facts.PDF"),
                content_type: Some("application/pdf"),
                body: b"%PDF-1.7 fake",
            },
        ])
        .await;

        let form = decoder(root.path(), 1024).decode(multipart).await.unwrap();
        assert_eq!(form.field("note"), Some("berth 4"));
        assert_eq!(form.files().len(), 1);

        let part = &form.files()[0];
        assert_eq!(part.field_name, "file");
        assert_eq!(part.original_filename.as_deref(), Some("Statement Of Facts.PDF"));
        assert_eq!(part.mime_type, "application/pdf");
        assert_eq!(part.size_bytes, 13);
        assert!(part.path.starts_with(form.scratch_path()));
        assert_eq!(part.path.extension().and_then(|e| e.to_str()), Some("pdf"));
        assert_eq!(std::fs::read(&part.path).unwrap(), b"%PDF-1.7 fake");
    }

    #[tokio::test]
    async fn scratch_directory_is_removed_on_drop() {
        let root = TempDir::new().unwrap();
        let multipart = multipart_for(&[Part {
            name: "file",
            filename: Some("a.png"),
            content_type: None,
            body: b"png",
        }])
        .await;

        let form = decoder(root.path(), 1024).decode(multipart).await.unwrap();
        assert_eq!(entries(root.path()), 1);
        assert_eq!(form.files()[0].mime_type, "application/octet-stream");
        drop(form);
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn oversized_body_fails_and_cleans_up() {
        let root = TempDir::new().unwrap();
        let multipart = multipart_for(&[Part {
            name: "file",
            filename: Some("big.pdf"),
            content_type: Some("application/pdf"),
            body: &[b'x'; 64],
        }])
        .await;

        let err = decoder(root.path(), 16).decode(multipart).await.unwrap_err();
        assert!(matches!(err, DecodeError::PayloadTooLarge { limit: 16 }));
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn disallowed_extension_is_rejected() {
        let root = TempDir::new().unwrap();
        let multipart = multipart_for(&[Part {
            name: "file",
            filename: Some("payload.exe"),
            content_type: None,
            body: b"MZ",
        }])
        .await;

        let err = decoder(root.path(), 1024).decode(multipart).await.unwrap_err();
        assert!(matches!(err, DecodeError::DisallowedExtension { ref filename } if filename == "payload.exe"));
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn part_without_a_name_is_malformed() {
        let root = TempDir::new().unwrap();
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data\r\n\r\nberth 4\r\n--{b}--\r\n",
            b = BOUNDARY
        );

        let err = decoder(root.path(), 1024)
            .decode(multipart_from_raw(body.into_bytes()).await)
            .await
            .unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(ref msg) if msg == "part is missing a field name"));
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn non_utf8_text_field_is_malformed() {
        let root = TempDir::new().unwrap();
        let multipart = multipart_for(&[Part {
            name: "vessel",
            filename: None,
            content_type: None,
            body: &[b'M', b'V', 0xff, 0xfe],
        }])
        .await;

        let err = decoder(root.path(), 1024).decode(multipart).await.unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(ref msg) if msg.contains("`vessel`")));
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn truncated_file_part_is_malformed_and_cleans_up() {
        let root = TempDir::new().unwrap();
        let mut body = body_for(&[Part {
            name: "file",
            filename: Some("sof.pdf"),
            content_type: Some("application/pdf"),
            body: &[b'x'; 4096],
        }]);
        // Cut inside the file content, before the closing boundary.
        body.truncate(body.len() - 1024);

        let err = decoder(root.path(), 1 << 20)
            .decode(multipart_from_raw(body).await)
            .await
            .unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(ref msg) if msg == UNPARSEABLE_BODY));
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn empty_filename_parts_are_ignored() {
        let root = TempDir::new().unwrap();
        let multipart = multipart_for(&[Part {
            name: "file",
            filename: Some(""),
            content_type: Some("application/octet-stream"),
            body: b"",
        }])
        .await;

        let form = decoder(root.path(), 1024).decode(multipart).await.unwrap();
        assert!(form.files().is_empty());
        assert!(form.primary_file().is_none());
    }

    #[tokio::test]
    async fn primary_file_follows_field_priority() {
        let root = TempDir::new().unwrap();
        let multipart = multipart_for(&[
            Part {
                name: "attachment",
                filename: Some("first.png"),
                content_type: None,
                body: b"1",
            },
            Part {
                name: "upload",
                filename: Some("second.png"),
                content_type: None,
                body: b"22",
            },
            Part {
                name: "file",
                filename: Some("third.pdf"),
                content_type: None,
                body: b"333",
            },
        ])
        .await;

        let form = decoder(root.path(), 1024).decode(multipart).await.unwrap();
        assert_eq!(form.primary_file().unwrap().field_name, "file");
        assert_eq!(form.files_by_field()["upload"].len(), 1);
    }

    #[tokio::test]
    async fn upload_field_beats_first_file() {
        let root = TempDir::new().unwrap();
        let multipart = multipart_for(&[
            Part {
                name: "attachment",
                filename: Some("first.png"),
                content_type: None,
                body: b"1",
            },
            Part {
                name: "upload",
                filename: Some("second.png"),
                content_type: None,
                body: b"22",
            },
        ])
        .await;

        let form = decoder(root.path(), 1024).decode(multipart).await.unwrap();
        let chosen = form.primary_file().unwrap();
        assert_eq!(chosen.original_filename.as_deref(), Some("second.png"));

        let root_only = multipart_for(&[Part {
            name: "attachment",
            filename: Some("only.docx"),
            content_type: None,
            body: b"1",
        }])
        .await;
        let form = decoder(root.path(), 1024).decode(root_only).await.unwrap();
        assert_eq!(form.primary_file().unwrap().field_name, "attachment");
    }

    #[tokio::test]
    async fn release_removes_scratch_directory() {
        let root = TempDir::new().unwrap();
        let multipart = multipart_for(&[Part {
            name: "file",
            filename: Some("a.pdf"),
            content_type: None,
            body: b"pdf",
        }])
        .await;

        let form = decoder(root.path(), 1024).decode(multipart).await.unwrap();
        form.release().unwrap();
        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn extension_detection() {
        assert_eq!(extension_of("report.final.PDF"), Some("pdf".into()));
        assert_eq!(extension_of("C:\\docs\\scan.JPeg"), Some("jpeg".into()));
        assert_eq!(extension_of(".bashrc"), None);
        assert_eq!(extension_of("README"), None);
        assert_eq!(extension_of("trailing."), None);
    }
}

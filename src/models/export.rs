//! Export formats and the rendered artifact.

use bytes::Bytes;
use std::{fmt, str::FromStr};

/// An externally produced extraction result; any JSON object.
pub type ResultRecord = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
        }
    }

    pub fn suggested_filename(self) -> &'static str {
        match self {
            ExportFormat::Json => "sof_export.json",
            ExportFormat::Csv => "sof_export.csv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Json => f.write_str("json"),
            ExportFormat::Csv => f.write_str("csv"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("json") {
            Ok(ExportFormat::Json)
        } else if s.eq_ignore_ascii_case("csv") {
            Ok(ExportFormat::Csv)
        } else {
            Err(s.to_string())
        }
    }
}

/// A fully materialized download.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub format: ExportFormat,
    pub bytes: Bytes,
    pub suggested_filename: String,
    pub content_type: String,
}

impl ExportArtifact {
    pub fn new(format: ExportFormat, bytes: impl Into<Bytes>) -> Self {
        Self {
            format,
            bytes: bytes.into(),
            suggested_filename: format.suggested_filename().to_string(),
            content_type: format.content_type().to_string(),
        }
    }

    /// `attachment; filename="<suggested>"`
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.suggested_filename)
    }
}

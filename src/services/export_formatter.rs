//! ExportFormatter: renders a `ResultRecord` as a downloadable artifact.
//!
//! JSON output is the record itself, pretty-printed with two-space indent.
//! Key order and number text survive unchanged.
//!
//! CSV output has two layouts:
//! - **rows**: the record holds a non-empty array of objects under the
//!   configured rows key (`events` by default). Each element is one row; the
//!   header is the union of element keys in first-seen order and missing keys
//!   render as empty cells.
//! - **flat**: anything else. One header row of the record's keys and one data
//!   row of its values.
//!
//! Cells: strings verbatim, numbers and booleans as JSON text, `null` empty,
//! arrays and objects as compact inline JSON. Quoting is left to the `csv`
//! writer (only when a cell holds a delimiter, quote or line break).

use crate::models::export::{ExportArtifact, ExportFormat, ResultRecord};
use serde_json::Value;
use std::{collections::HashSet, io};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("serializing json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("writing csv: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type ExportResult<T> = Result<T, ExportError>;

#[derive(Clone, Debug)]
pub struct ExportFormatter {
    rows_key: String,
}

/// How a record maps onto CSV rows.
#[derive(Debug)]
enum CsvLayout<'a> {
    Flat,
    Rows(&'a [Value]),
}

impl ExportFormatter {
    pub fn new(rows_key: impl Into<String>) -> Self {
        Self {
            rows_key: rows_key.into(),
        }
    }

    pub fn format(&self, record: &ResultRecord, target: ExportFormat) -> ExportResult<ExportArtifact> {
        let bytes = match target {
            ExportFormat::Json => serde_json::to_vec_pretty(record)?,
            ExportFormat::Csv => self.render_csv(record)?,
        };
        debug!("rendered {} export ({} bytes)", target, bytes.len());
        Ok(ExportArtifact::new(target, bytes))
    }

    fn layout<'a>(&self, record: &'a ResultRecord) -> CsvLayout<'a> {
        match record.get(&self.rows_key) {
            Some(Value::Array(rows)) if !rows.is_empty() && rows.iter().all(Value::is_object) => {
                CsvLayout::Rows(rows)
            }
            _ => CsvLayout::Flat,
        }
    }

    fn render_csv(&self, record: &ResultRecord) -> ExportResult<Vec<u8>> {
        let (header, rows): (Vec<&str>, Vec<Vec<String>>) = match self.layout(record) {
            CsvLayout::Flat => {
                let header = record.keys().map(String::as_str).collect();
                let row = record
                    .values()
                    .map(|value| cell(Some(value)))
                    .collect::<ExportResult<Vec<_>>>()?;
                (header, vec![row])
            }
            CsvLayout::Rows(items) => {
                let header = union_keys(items);
                let rows = items
                    .iter()
                    .map(|item| {
                        header
                            .iter()
                            .map(|key| cell(item.get(*key)))
                            .collect::<ExportResult<Vec<_>>>()
                    })
                    .collect::<ExportResult<Vec<_>>>()?;
                (header, rows)
            }
        };

        // `{}` has no columns; emit nothing rather than a lone empty record.
        if header.is_empty() {
            return Ok(Vec::new());
        }

        let mut wtr = csv::WriterBuilder::new().from_writer(Vec::new());
        wtr.write_record(&header)?;
        for row in rows {
            wtr.write_record(&row)?;
        }
        wtr.into_inner().map_err(|err| ExportError::Io(err.into_error()))
    }
}

fn union_keys(items: &[Value]) -> Vec<&str> {
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for key in items
        .iter()
        .filter_map(Value::as_object)
        .flat_map(|obj| obj.keys())
    {
        if seen.insert(key.as_str()) {
            keys.push(key.as_str());
        }
    }
    keys
}

fn cell(value: Option<&Value>) -> ExportResult<String> {
    Ok(match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(nested @ (Value::Array(_) | Value::Object(_))) => serde_json::to_string(nested)?,
    })
}

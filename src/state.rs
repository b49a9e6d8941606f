//! Shared, read-only request state.

use crate::{
    config::AppConfig,
    services::{export_formatter::ExportFormatter, multipart_decoder::MultipartDecoder},
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub decoder: MultipartDecoder,
    pub formatter: ExportFormatter,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            decoder: MultipartDecoder::from_config(&config),
            formatter: ExportFormatter::new(config.csv_rows_key.clone()),
            config: Arc::new(config),
        }
    }
}

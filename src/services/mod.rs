pub mod export_formatter;
pub mod multipart_decoder;

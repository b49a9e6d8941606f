//! Upload-ingestion and multi-format export gateway for Statement of Facts
//! documents.
//!
//! Uploads are streamed into per-request scratch space and acknowledged;
//! previously computed result records are rendered back as JSON or CSV
//! downloads.

pub mod config;
pub mod cors;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

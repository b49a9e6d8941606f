//! Defines routes for the upload and export gateway.
//!
//! ## Structure
//! - **Upload**
//!   - `POST    /api/upload` - multipart document upload
//!   - `OPTIONS /api/upload` - CORS pre-flight (204, answered by the CORS layer)
//!
//! - **Export**
//!   - `POST    /api/export/{format}` - render a result record as `json` or `csv`
//!   - `OPTIONS /api/export/{format}` - CORS pre-flight (204, answered by the CORS layer)
//!
//! - **Health**
//!   - `GET /healthz`, `GET /readyz`
//!
//! Other verbs on the API routes answer 405 with an empty body.

use crate::{
    cors::{cors_layer, preflight_no_content},
    handlers::{
        export_handlers::export_record,
        health_handlers::{healthz, readyz},
        upload_handlers::{method_not_allowed, upload_document},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Room for multipart boundaries and part headers on top of the content cap.
const MULTIPART_ENVELOPE_ALLOWANCE: usize = 64 * 1024;

/// Build the router for all gateway routes.
///
/// Body limits come from the state's configuration: uploads get the content
/// cap plus an envelope allowance (the decoder enforces the exact cap),
/// exports get `max_export_bytes`.
pub fn routes(state: &AppState) -> Router<AppState> {
    let upload_limit = usize::try_from(state.config.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_ENVELOPE_ALLOWANCE);
    let export_limit = usize::try_from(state.config.max_export_bytes).unwrap_or(usize::MAX);

    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(
            "/api/upload",
            post(upload_document)
                .fallback(method_not_allowed)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/api/export/{format}",
            post(export_record)
                .fallback(method_not_allowed)
                .layer(DefaultBodyLimit::max(export_limit)),
        )
}

/// Routes plus state, CORS headers and request tracing.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    routes(&state)
        .with_state(state)
        .layer(cors)
        .layer(middleware::from_fn(preflight_no_content))
        .layer(TraceLayer::new_for_http())
}

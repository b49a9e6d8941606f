//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks the upload scratch directory

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;
use tokio::fs;
use uuid::Uuid;

/// `GET /healthz`
///
/// Liveness check. Always 200, never touches disk.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Writes, reads back and deletes a marker file under the scratch root.
/// HTTP 200 when that works, 503 otherwise.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let marker = state
        .decoder
        .scratch_root()
        .join(format!(".readyz-{}", Uuid::new_v4()));

    let scratch_check = match fs::write(&marker, b"readyz").await {
        Ok(_) => match fs::read(&marker).await {
            Ok(bytes) if bytes == b"readyz" => match fs::remove_file(&marker).await {
                Ok(_) => (true, None),
                Err(e) => (false, Some(format!("remove failed: {}", e))),
            },
            Ok(_) => {
                let _ = fs::remove_file(&marker).await;
                (false, Some("read-back mismatch".to_string()))
            }
            Err(e) => {
                let _ = fs::remove_file(&marker).await;
                (false, Some(format!("read failed: {}", e)))
            }
        },
        Err(e) => (false, Some(format!("write failed: {}", e))),
    };

    if let Some(reason) = &scratch_check.1 {
        tracing::warn!("readiness check failed for scratch dir: {}", reason);
    }

    let mut checks = HashMap::new();
    checks.insert(
        "scratch_dir".to_string(),
        CheckResult {
            ok: scratch_check.0,
            error: scratch_check.1,
        },
    );

    let all_ok = checks.values().all(|c| c.ok);
    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadyResponse {
            status: if all_ok { "ok".into() } else { "fail".into() },
            checks,
        }),
    )
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct CheckResult {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<String, CheckResult>,
}

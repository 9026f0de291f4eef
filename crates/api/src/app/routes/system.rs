use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::app::AppState;
use crate::context::PrincipalContext;

/// Liveness: the process is up and serving.
pub async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Readiness: 503 while the policy cache may be stale.
pub async fn readyz(Extension(state): Extension<AppState>) -> impl IntoResponse {
    if !state.health_check_enabled {
        return (StatusCode::OK, Json(json!({ "status": "ok", "checked": false })));
    }

    let status = state.health.status();
    let code = if status.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        code,
        Json(json!({
            "status": if status.healthy { "ok" } else { "degraded" },
            "checked": true,
            "policy": status,
        })),
    )
}

pub async fn whoami(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    Json(json!({ "subject": principal.subject() }))
}

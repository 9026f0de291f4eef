//! Decision endpoint: "may I (or may they) do this?"

use axum::{Json, extract::Extension};

use clinicos_authz::Decision;

use crate::app::AppState;
use crate::app::dto::CheckRequest;
use crate::app::errors::ApiError;
use crate::authz;
use crate::context::PrincipalContext;

/// POST /check - explain the decision for one request tuple.
///
/// Asking about another subject is policy introspection and needs
/// `policy:read` in the same domain.
pub async fn check(
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<PrincipalContext>,
    Json(req): Json<CheckRequest>,
) -> Result<Json<Decision>, ApiError> {
    let subject = match req.subject.as_deref() {
        Some(other) if other != principal.subject() => {
            authz::require(state.authorizer.as_ref(), &principal, &req.domain, "policy", "read")?;
            other
        }
        _ => principal.subject(),
    };

    let decision = state
        .authorizer
        .enforce_ex(subject, &req.domain, &req.resource, &req.action)?;
    Ok(Json(decision))
}

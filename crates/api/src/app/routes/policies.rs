//! Role assignment and permission administration endpoints.
//!
//! Each handler is guarded in the domain it changes. Template domains
//! (`clinic:*`, `project:*`, ...) cannot be request domains, so changes to
//! them are guarded in `sys`.

use axum::{
    Json,
    extract::{Extension, Path},
};

use crate::app::AppState;
use crate::app::dto::{
    ChangedResponse, PermissionRequest, PermissionsResponse, RemovedResponse, RolesResponse,
};
use crate::app::errors::ApiError;
use crate::authz;
use crate::context::PrincipalContext;

const SYSTEM_DOMAIN: &str = "sys";

fn guard_domain(domain: &str) -> &str {
    if domain.contains('*') { SYSTEM_DOMAIN } else { domain }
}

/// GET /domains/:domain/subjects/:subject/roles
pub async fn list_roles(
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<PrincipalContext>,
    Path((domain, subject)): Path<(String, String)>,
) -> Result<Json<RolesResponse>, ApiError> {
    if subject != principal.subject() {
        authz::require(state.authorizer.as_ref(), &principal, &domain, "role", "read")?;
    }
    let roles = state.authorizer.get_roles_for_user_in_domain(&subject, &domain)?;
    Ok(Json(RolesResponse {
        subject,
        domain,
        roles,
    }))
}

/// PUT /domains/:domain/subjects/:subject/roles/:role
pub async fn assign_role(
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<PrincipalContext>,
    Path((domain, subject, role)): Path<(String, String, String)>,
) -> Result<Json<ChangedResponse>, ApiError> {
    authz::require(state.authorizer.as_ref(), &principal, &domain, "role", "assign")?;
    let changed = state
        .authorizer
        .add_role_for_user_in_domain(&subject, &role, &domain)
        .await?;
    Ok(Json(ChangedResponse { changed }))
}

/// DELETE /domains/:domain/subjects/:subject/roles/:role
pub async fn revoke_role(
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<PrincipalContext>,
    Path((domain, subject, role)): Path<(String, String, String)>,
) -> Result<Json<ChangedResponse>, ApiError> {
    authz::require(state.authorizer.as_ref(), &principal, &domain, "role", "assign")?;
    let changed = state
        .authorizer
        .remove_role_for_user_in_domain(&subject, &role, &domain)
        .await?;
    Ok(Json(ChangedResponse { changed }))
}

/// GET /domains/:domain/roles/:role/permissions
pub async fn list_permissions(
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<PrincipalContext>,
    Path((domain, role)): Path<(String, String)>,
) -> Result<Json<PermissionsResponse>, ApiError> {
    authz::require(state.authorizer.as_ref(), &principal, guard_domain(&domain), "policy", "read")?;
    let permissions = state
        .authorizer
        .get_permissions_for_role_in_domain(&role, &domain)?;
    Ok(Json(PermissionsResponse {
        role,
        domain,
        permissions,
    }))
}

/// POST /domains/:domain/roles/:role/permissions
pub async fn add_permission(
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<PrincipalContext>,
    Path((domain, role)): Path<(String, String)>,
    Json(req): Json<PermissionRequest>,
) -> Result<Json<ChangedResponse>, ApiError> {
    authz::require(state.authorizer.as_ref(), &principal, guard_domain(&domain), "policy", "manage")?;
    let changed = state
        .authorizer
        .add_permission(&role, &domain, &req.resource, &req.action, &req.effect)
        .await?;
    Ok(Json(ChangedResponse { changed }))
}

/// DELETE /domains/:domain/roles/:role/permissions
pub async fn remove_permission(
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<PrincipalContext>,
    Path((domain, role)): Path<(String, String)>,
    Json(req): Json<PermissionRequest>,
) -> Result<Json<ChangedResponse>, ApiError> {
    authz::require(state.authorizer.as_ref(), &principal, guard_domain(&domain), "policy", "manage")?;
    let changed = state
        .authorizer
        .remove_permission(&role, &domain, &req.resource, &req.action, &req.effect)
        .await?;
    Ok(Json(ChangedResponse { changed }))
}

/// DELETE /subjects/:subject - offboard a subject from every domain.
pub async fn remove_subject(
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<PrincipalContext>,
    Path(subject): Path<String>,
) -> Result<Json<RemovedResponse>, ApiError> {
    authz::require(state.authorizer.as_ref(), &principal, SYSTEM_DOMAIN, "member", "delete")?;
    let removed = state.authorizer.remove_subject(&subject).await?;
    Ok(Json(RemovedResponse { removed }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_are_guarded_in_sys() {
        assert_eq!(guard_domain("clinic:*"), "sys");
        assert_eq!(guard_domain("*"), "sys");
        assert_eq!(guard_domain("sys"), "sys");
        let concrete = "clinic:0190a5a8-7f39-7c6e-9b1e-3b6f5e2a9d41";
        assert_eq!(guard_domain(concrete), concrete);
    }
}

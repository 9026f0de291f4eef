use serde::{Deserialize, Serialize};

use clinicos_authz::PermissionPolicy;
use clinicos_authz::vocabulary::Role;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub domain: String,
    pub resource: String,
    pub action: String,
    /// Ask about someone else; requires `policy:read` in `domain`.
    pub subject: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PermissionRequest {
    pub resource: String,
    pub action: String,
    pub effect: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct ChangedResponse {
    pub changed: bool,
}

#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    pub removed: u64,
}

#[derive(Debug, Serialize)]
pub struct RolesResponse {
    pub subject: String,
    pub domain: String,
    pub roles: Vec<Role>,
}

#[derive(Debug, Serialize)]
pub struct PermissionsResponse {
    pub role: String,
    pub domain: String,
    pub permissions: Vec<PermissionPolicy>,
}

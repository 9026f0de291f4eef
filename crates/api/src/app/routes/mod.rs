use axum::{
    Router,
    routing::{delete, get, post, put},
};

pub mod check;
pub mod policies;
pub mod system;

/// Router for all endpoints that need an identified principal.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/check", post(check::check))
        .route(
            "/domains/:domain/subjects/:subject/roles",
            get(policies::list_roles),
        )
        .route(
            "/domains/:domain/subjects/:subject/roles/:role",
            put(policies::assign_role).delete(policies::revoke_role),
        )
        .route(
            "/domains/:domain/roles/:role/permissions",
            get(policies::list_permissions)
                .post(policies::add_permission)
                .delete(policies::remove_permission),
        )
        .route("/subjects/:subject", delete(policies::remove_subject))
}

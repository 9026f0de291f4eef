//! HTTP API application wiring (Axum router + shared state).
//!
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use clinicos_authz::{Authorizer, HealthTracker};
use clinicos_infra::AuthzRuntime;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub authorizer: Arc<dyn Authorizer>,
    pub health: Arc<HealthTracker>,
    /// When off, `/readyz` reports ready regardless of sync health.
    pub health_check_enabled: bool,
}

impl AppState {
    pub fn from_runtime(runtime: &AuthzRuntime) -> Self {
        Self {
            authorizer: runtime.authorizer.clone(),
            health: runtime.health.clone(),
            health_check_enabled: runtime.health_check_enabled,
        }
    }
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(state: AppState) -> Router {
    // Protected routes: require an identified principal.
    let protected = routes::router().layer(axum::middleware::from_fn(
        middleware::identity_middleware,
    ));

    Router::new()
        .route("/healthz", get(routes::system::healthz))
        .route("/readyz", get(routes::system::readyz))
        .merge(protected)
        .layer(ServiceBuilder::new().layer(Extension(state)))
}

//! HTTP adapter for the authorization engine: identity middleware, route
//! guard, health probes, and the administration endpoints.

pub mod app;
pub mod authz;
pub mod context;
pub mod middleware;

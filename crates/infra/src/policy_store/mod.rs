//! Durable [`PolicyStore`](clinicos_authz::PolicyStore) implementations.
//!
//! The in-memory store lives next to the trait in `clinicos-authz`.

pub mod postgres;

pub use postgres::PostgresPolicyStore;

//! Infrastructure layer: Postgres policy storage, change notifier transports,
//! environment configuration, and the background sync worker.

pub mod config;
pub mod notifier;
pub mod policy_store;
pub mod runtime;
pub mod workers;

pub use config::{AuthzConfig, ConfigError, NotifierBackend};
pub use runtime::{AuthzRuntime, bootstrap};

#[cfg(test)]
mod integration_tests;

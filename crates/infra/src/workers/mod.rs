//! Background workers.

pub mod policy_sync;

pub use policy_sync::{PolicySyncWorker, SyncHandle};

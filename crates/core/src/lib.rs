//! `clinicos-core`: identifiers shared by the authorization engine and its
//! collaborators.
//!
//! Pure value types; no I/O.

pub mod error;
pub mod id;

pub use error::IdError;
pub use id::{ClinicId, EntityId, EntityKind, ProjectId, UserId};

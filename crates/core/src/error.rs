//! Identifier parse errors.

use thiserror::Error;

/// An identifier could not be parsed from its string form.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {reason}")]
pub struct IdError {
    pub kind: &'static str,
    pub reason: String,
}

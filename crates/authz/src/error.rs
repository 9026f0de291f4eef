use thiserror::Error;

use clinicos_events::NotifyError;

use crate::store::StoreError;
use crate::vocabulary::VocabularyError;

pub type AuthzResult<T> = Result<T, AuthzError>;

/// Errors surfaced by enforcement and administration.
///
/// `Forbidden` is the sentinel callers match on; it is only produced for a
/// well-formed request that evaluated to "not allowed".
#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("forbidden")]
    Forbidden,

    #[error("policy store error: {0}")]
    Store(#[from] StoreError),

    #[error("change notifier error: {0}")]
    Notify(#[from] NotifyError),

    #[error("policy reload failed: {0}")]
    Reload(String),
}

impl AuthzError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden)
    }

    pub fn is_invalid_arguments(&self) -> bool {
        matches!(self, Self::InvalidArguments(_))
    }
}

impl From<VocabularyError> for AuthzError {
    fn from(value: VocabularyError) -> Self {
        Self::InvalidArguments(value.to_string())
    }
}

/// A batch write stopped at its first failing row.
///
/// Rows before `index` were applied (idempotently); rows from `index` on were not.
#[derive(Debug, Error)]
#[error("batch aborted at row {index} ({rule}) after {applied} new rows: {source}")]
pub struct BatchError {
    pub index: usize,
    pub rule: String,
    pub applied: usize,
    #[source]
    pub source: AuthzError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocabulary::VocabularyKind;

    #[test]
    fn vocabulary_errors_become_invalid_arguments() {
        let err: AuthzError = VocabularyError::Empty(VocabularyKind::Role).into();
        assert!(err.is_invalid_arguments());
        assert!(!err.is_forbidden());
    }

    #[test]
    fn forbidden_renders_plainly() {
        assert_eq!(AuthzError::Forbidden.to_string(), "forbidden");
    }
}

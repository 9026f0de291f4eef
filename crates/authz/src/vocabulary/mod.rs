//! Closed policy vocabulary: roles, resources, actions, and domains.
//!
//! Every value entering the engine through its public surface is parsed into
//! one of these types first. Unknown values are rejected here, at the
//! boundary, never at evaluation or storage time.

mod action;
mod domain;
mod resource;
mod role;

pub use action::{Action, Verb};
pub use domain::{
    Domain, DomainPrefix, DomainScope, SYSTEM_DOMAIN, WILDCARD_DOMAIN, clinic_domain, domain,
    is_valid_domain, project_domain, system_domain, user_domain,
};
pub use resource::{Resource, ResourceKind};
pub use role::Role;

use thiserror::Error;

/// The wildcard sentinel shared by every vocabulary kind.
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VocabularyKind {
    Action,
    Resource,
    Role,
    Domain,
}

impl VocabularyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            VocabularyKind::Action => "action",
            VocabularyKind::Resource => "resource",
            VocabularyKind::Role => "role",
            VocabularyKind::Domain => "domain",
        }
    }
}

impl core::fmt::Display for VocabularyKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VocabularyError {
    #[error("{0} must not be empty")]
    Empty(VocabularyKind),

    #[error("unknown {kind} '{value}'")]
    Unknown { kind: VocabularyKind, value: String },

    #[error("malformed {kind} '{value}': {reason}")]
    Malformed {
        kind: VocabularyKind,
        value: String,
        reason: &'static str,
    },
}

impl VocabularyError {
    pub(crate) fn unknown(kind: VocabularyKind, value: &str) -> Self {
        Self::Unknown {
            kind,
            value: value.to_string(),
        }
    }

    pub(crate) fn malformed(kind: VocabularyKind, value: &str, reason: &'static str) -> Self {
        Self::Malformed {
            kind,
            value: value.to_string(),
            reason,
        }
    }
}

/// Membership check for any vocabulary kind. Wildcards are accepted.
pub fn validate(kind: VocabularyKind, value: &str) -> bool {
    match kind {
        VocabularyKind::Action => value.parse::<Action>().is_ok(),
        VocabularyKind::Resource => value.parse::<Resource>().is_ok(),
        VocabularyKind::Role => value.parse::<Role>().is_ok(),
        VocabularyKind::Domain => is_valid_domain(value),
    }
}

/// Path/parameter segments: non-empty, printable, no whitespace.
pub(crate) fn is_clean_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| !c.is_whitespace() && !c.is_control())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_dispatches_by_kind() {
        assert!(validate(VocabularyKind::Role, "owner"));
        assert!(validate(VocabularyKind::Role, "*"));
        assert!(!validate(VocabularyKind::Role, "ownr"));

        assert!(validate(VocabularyKind::Resource, "patient/123"));
        assert!(!validate(VocabularyKind::Resource, "patients"));

        assert!(validate(VocabularyKind::Action, "export:csv"));
        assert!(!validate(VocabularyKind::Action, "destroy"));

        assert!(validate(VocabularyKind::Domain, "sys"));
        assert!(!validate(VocabularyKind::Domain, "system"));
    }

    #[test]
    fn empty_values_are_never_valid() {
        for kind in [
            VocabularyKind::Action,
            VocabularyKind::Resource,
            VocabularyKind::Role,
            VocabularyKind::Domain,
        ] {
            assert!(!validate(kind, ""), "{kind} accepted empty");
        }
    }
}

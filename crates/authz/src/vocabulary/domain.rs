//! Domains: the namespaces policy rows are scoped to.
//!
//! Canonical forms:
//! - `sys`: the system scope.
//! - `<prefix><uuid>`: an entity scope (`clinic:…`, `project:…`, `user:…`).
//!   The UUID must be in canonical lowercase hyphenated form so one entity
//!   never has two spellings.
//! - `*` and `<prefix>*`: wildcards, valid only as the domain of a
//!   permission row. They never cover `sys`.
//!
//! Builders do not validate. Validation happens where a domain is consumed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use clinicos_core::{ClinicId, ProjectId, UserId};

use super::{VocabularyError, VocabularyKind, WILDCARD};

pub const SYSTEM_DOMAIN: &str = "sys";
pub const WILDCARD_DOMAIN: &str = WILDCARD;

/// Entity-scope prefix families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DomainPrefix {
    Clinic,
    Project,
    User,
}

impl DomainPrefix {
    pub const ALL: [DomainPrefix; 3] = [DomainPrefix::Clinic, DomainPrefix::Project, DomainPrefix::User];

    pub fn as_str(self) -> &'static str {
        match self {
            DomainPrefix::Clinic => "clinic:",
            DomainPrefix::Project => "project:",
            DomainPrefix::User => "user:",
        }
    }
}

/// What a domain string denotes, once classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainScope {
    System,
    Entity(DomainPrefix),
    /// `*`
    AnyEntity,
    /// `<prefix>*`
    AnyOfKind(DomainPrefix),
}

impl DomainScope {
    pub fn is_wildcard(self) -> bool {
        matches!(self, DomainScope::AnyEntity | DomainScope::AnyOfKind(_))
    }

    /// Whether a permission row scoped to `self` applies to a request in `request`.
    ///
    /// Only wildcard scopes cover other domains, and only entity ones.
    pub fn covers(self, request: DomainScope) -> bool {
        match (self, request) {
            (DomainScope::AnyEntity, DomainScope::Entity(_)) => true,
            (DomainScope::AnyOfKind(p), DomainScope::Entity(q)) => p == q,
            _ => false,
        }
    }
}

/// Classify a domain string, or `None` if it is not a valid domain.
pub fn classify(value: &str) -> Option<DomainScope> {
    if value == SYSTEM_DOMAIN {
        return Some(DomainScope::System);
    }
    if value == WILDCARD_DOMAIN {
        return Some(DomainScope::AnyEntity);
    }
    for prefix in DomainPrefix::ALL {
        if let Some(rest) = value.strip_prefix(prefix.as_str()) {
            if rest == WILDCARD {
                return Some(DomainScope::AnyOfKind(prefix));
            }
            return is_canonical_uuid(rest).then_some(DomainScope::Entity(prefix));
        }
    }
    None
}

fn is_canonical_uuid(value: &str) -> bool {
    Uuid::try_parse(value)
        .map(|u| u.hyphenated().to_string() == value)
        .unwrap_or(false)
}

/// Accepts `sys`, the wildcards, and `<prefix><uuid>`; rejects everything else.
pub fn is_valid_domain(value: &str) -> bool {
    classify(value).is_some()
}

/// A domain string. Possibly invalid when built with [`domain`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Domain(String);

impl Domain {
    /// Parse and validate.
    pub fn parse(value: &str) -> Result<Self, VocabularyError> {
        if value.is_empty() {
            return Err(VocabularyError::Empty(VocabularyKind::Domain));
        }
        match classify(value) {
            Some(_) => Ok(Self(value.to_string())),
            None => Err(VocabularyError::unknown(VocabularyKind::Domain, value)),
        }
    }

    pub fn system() -> Self {
        Self(SYSTEM_DOMAIN.to_string())
    }

    pub fn any() -> Self {
        Self(WILDCARD_DOMAIN.to_string())
    }

    pub fn any_of(prefix: DomainPrefix) -> Self {
        Self(format!("{}{}", prefix.as_str(), WILDCARD))
    }

    pub fn scope(&self) -> Option<DomainScope> {
        classify(&self.0)
    }

    pub fn is_valid(&self) -> bool {
        self.scope().is_some()
    }

    pub fn is_system(&self) -> bool {
        self.0 == SYSTEM_DOMAIN
    }

    pub fn is_wildcard(&self) -> bool {
        self.scope().is_some_and(DomainScope::is_wildcard)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Domain {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl core::str::FromStr for Domain {
    type Err = VocabularyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Domain::parse(value)
    }
}

/// Build `<prefix><id>`. Never fails and never validates.
pub fn domain(prefix: DomainPrefix, id: impl core::fmt::Display) -> Domain {
    Domain(format!("{}{}", prefix.as_str(), id))
}

pub fn system_domain() -> Domain {
    Domain::system()
}

pub fn clinic_domain(id: ClinicId) -> Domain {
    domain(DomainPrefix::Clinic, id)
}

pub fn project_domain(id: ProjectId) -> Domain {
    domain(DomainPrefix::Project, id)
}

pub fn user_domain(id: UserId) -> Domain {
    domain(DomainPrefix::User, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_canonical_forms() {
        let id = Uuid::now_v7();
        assert!(is_valid_domain("sys"));
        assert!(is_valid_domain("*"));
        assert!(is_valid_domain(&format!("project:{id}")));
        assert!(is_valid_domain(&format!("clinic:{id}")));
        assert!(is_valid_domain(&format!("user:{id}")));
        assert!(is_valid_domain("clinic:*"));
    }

    #[test]
    fn rejects_everything_else() {
        let id = Uuid::now_v7();
        assert!(!is_valid_domain(""));
        assert!(!is_valid_domain("project:not-a-uuid"));
        assert!(!is_valid_domain("project:"));
        assert!(!is_valid_domain("SYS"));
        assert!(!is_valid_domain(&format!("tenant:{id}")));
        assert!(!is_valid_domain(&format!("project:{}", id.simple())));
        assert!(!is_valid_domain(&format!(
            "project:{}",
            id.to_string().to_uppercase()
        )));
        assert!(!is_valid_domain(&format!("project:{id} ")));
    }

    #[test]
    fn builders_do_not_validate() {
        let candidate = domain(DomainPrefix::Project, "not-a-uuid");
        assert_eq!(candidate.as_str(), "project:not-a-uuid");
        assert!(!candidate.is_valid());

        let clinic = ClinicId::new();
        assert_eq!(clinic_domain(clinic).as_str(), format!("clinic:{clinic}"));
        assert!(clinic_domain(clinic).is_valid());
    }

    #[test]
    fn wildcards_never_cover_system() {
        assert!(!DomainScope::AnyEntity.covers(DomainScope::System));
        assert!(!DomainScope::AnyOfKind(DomainPrefix::Clinic).covers(DomainScope::System));
        assert!(DomainScope::AnyEntity.covers(DomainScope::Entity(DomainPrefix::User)));
        assert!(
            !DomainScope::AnyOfKind(DomainPrefix::Clinic)
                .covers(DomainScope::Entity(DomainPrefix::Project))
        );
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn any_uuid_under_a_known_prefix_is_valid(bytes in any::<[u8; 16]>(), idx in 0usize..3) {
                let prefix = DomainPrefix::ALL[idx];
                let value = format!("{}{}", prefix.as_str(), Uuid::from_bytes(bytes));
                prop_assert_eq!(classify(&value), Some(DomainScope::Entity(prefix)));
            }

            #[test]
            fn non_uuid_suffix_is_rejected(suffix in "[a-z0-9-]{0,40}", idx in 0usize..3) {
                prop_assume!(Uuid::try_parse(&suffix).is_err());
                let value = format!("{}{}", DomainPrefix::ALL[idx].as_str(), suffix);
                prop_assert!(!is_valid_domain(&value));
            }
        }
    }
}

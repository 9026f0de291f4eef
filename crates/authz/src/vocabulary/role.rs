use serde::{Deserialize, Serialize};

use super::{VocabularyError, VocabularyKind, WILDCARD};

/// Role identifier used in grouping and permission rows.
///
/// Clinic member roles held by business services map onto these by name.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Platform operator. Holding it in `sys` triggers the bypass when enabled.
    Superadmin,
    /// Platform support staff (read-mostly system access).
    Support,
    Owner,
    Admin,
    Doctor,
    Nurse,
    Receptionist,
    Accountant,
    Member,
    Patient,
    /// The user acting on their own user-scoped domain.
    #[serde(rename = "self")]
    SelfScope,
    /// Matches every role. Only meaningful on permission rows.
    #[serde(rename = "*")]
    Any,
}

impl Role {
    pub const ALL: [Role; 12] = [
        Role::Superadmin,
        Role::Support,
        Role::Owner,
        Role::Admin,
        Role::Doctor,
        Role::Nurse,
        Role::Receptionist,
        Role::Accountant,
        Role::Member,
        Role::Patient,
        Role::SelfScope,
        Role::Any,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Superadmin => "superadmin",
            Role::Support => "support",
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Nurse => "nurse",
            Role::Receptionist => "receptionist",
            Role::Accountant => "accountant",
            Role::Member => "member",
            Role::Patient => "patient",
            Role::SelfScope => "self",
            Role::Any => WILDCARD,
        }
    }

    pub fn is_wildcard(self) -> bool {
        self == Role::Any
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Role {
    type Err = VocabularyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.is_empty() {
            return Err(VocabularyError::Empty(VocabularyKind::Role));
        }
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == value)
            .ok_or_else(|| VocabularyError::unknown(VocabularyKind::Role, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_role_parses_from_its_name() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
    }

    #[test]
    fn names_are_case_sensitive() {
        assert!("Owner".parse::<Role>().is_err());
        assert!("SUPERADMIN".parse::<Role>().is_err());
    }

    #[test]
    fn serde_uses_wire_names() {
        assert_eq!(serde_json::to_string(&Role::SelfScope).unwrap(), "\"self\"");
        assert_eq!(serde_json::to_string(&Role::Any).unwrap(), "\"*\"");
        assert_eq!(
            serde_json::from_str::<Role>("\"receptionist\"").unwrap(),
            Role::Receptionist
        );
    }
}

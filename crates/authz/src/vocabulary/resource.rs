use serde::{Deserialize, Serialize};

use super::{VocabularyError, VocabularyKind, WILDCARD, is_clean_segment};

/// Resource kinds protected by the engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Clinic,
    Member,
    Patient,
    Appointment,
    Schedule,
    Payment,
    Invoice,
    Message,
    Chat,
    Project,
    Profile,
    Role,
    Policy,
    Report,
    Settings,
    AuditLog,
    #[serde(rename = "*")]
    Any,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 17] = [
        ResourceKind::Clinic,
        ResourceKind::Member,
        ResourceKind::Patient,
        ResourceKind::Appointment,
        ResourceKind::Schedule,
        ResourceKind::Payment,
        ResourceKind::Invoice,
        ResourceKind::Message,
        ResourceKind::Chat,
        ResourceKind::Project,
        ResourceKind::Profile,
        ResourceKind::Role,
        ResourceKind::Policy,
        ResourceKind::Report,
        ResourceKind::Settings,
        ResourceKind::AuditLog,
        ResourceKind::Any,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Clinic => "clinic",
            ResourceKind::Member => "member",
            ResourceKind::Patient => "patient",
            ResourceKind::Appointment => "appointment",
            ResourceKind::Schedule => "schedule",
            ResourceKind::Payment => "payment",
            ResourceKind::Invoice => "invoice",
            ResourceKind::Message => "message",
            ResourceKind::Chat => "chat",
            ResourceKind::Project => "project",
            ResourceKind::Profile => "profile",
            ResourceKind::Role => "role",
            ResourceKind::Policy => "policy",
            ResourceKind::Report => "report",
            ResourceKind::Settings => "settings",
            ResourceKind::AuditLog => "audit_log",
            ResourceKind::Any => WILDCARD,
        }
    }

    fn lookup(value: &str) -> Option<ResourceKind> {
        ResourceKind::ALL.into_iter().find(|k| k.as_str() == value)
    }
}

impl core::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated resource: a kind, optionally followed by an object path.
///
/// `patient`, `patient/<id>`, `chat/<id>/messages`. Policy rows may use
/// `:name` for one segment and a trailing `*` for the rest of the path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Resource {
    kind: ResourceKind,
    raw: String,
}

impl Resource {
    pub fn kind_only(kind: ResourceKind) -> Self {
        Self {
            kind,
            raw: kind.as_str().to_string(),
        }
    }

    pub fn any() -> Self {
        Self::kind_only(ResourceKind::Any)
    }

    /// `kind/<id>` for a concrete object.
    pub fn object(kind: ResourceKind, id: impl core::fmt::Display) -> Self {
        Self {
            kind,
            raw: format!("{}/{}", kind.as_str(), id),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn path(&self) -> Option<&str> {
        self.raw.split_once('/').map(|(_, p)| p)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_wildcard(&self) -> bool {
        self.kind == ResourceKind::Any
    }
}

impl core::fmt::Display for Resource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl core::str::FromStr for Resource {
    type Err = VocabularyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.is_empty() {
            return Err(VocabularyError::Empty(VocabularyKind::Resource));
        }

        let mut segments = value.split('/');
        let head = segments.next().unwrap_or_default();
        let kind = ResourceKind::lookup(head)
            .ok_or_else(|| VocabularyError::unknown(VocabularyKind::Resource, value))?;

        let rest: Vec<&str> = segments.collect();
        if kind == ResourceKind::Any && !rest.is_empty() {
            return Err(VocabularyError::malformed(
                VocabularyKind::Resource,
                value,
                "wildcard resource takes no path",
            ));
        }
        for (idx, segment) in rest.iter().enumerate() {
            if !is_clean_segment(segment) {
                return Err(VocabularyError::malformed(
                    VocabularyKind::Resource,
                    value,
                    "path segments must be non-empty",
                ));
            }
            if segment.contains('*') && (*segment != WILDCARD || idx + 1 != rest.len()) {
                return Err(VocabularyError::malformed(
                    VocabularyKind::Resource,
                    value,
                    "'*' is only allowed as the whole last segment",
                ));
            }
        }

        Ok(Self {
            kind,
            raw: value.to_string(),
        })
    }
}

impl Serialize for Resource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Resource {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_and_paths_parse() {
        let plain: Resource = "patient".parse().unwrap();
        assert_eq!(plain.kind(), ResourceKind::Patient);
        assert_eq!(plain.path(), None);

        let nested: Resource = "chat/42/messages".parse().unwrap();
        assert_eq!(nested.kind(), ResourceKind::Chat);
        assert_eq!(nested.path(), Some("42/messages"));

        let pattern: Resource = "patient/:id".parse().unwrap();
        assert_eq!(pattern.path(), Some(":id"));

        assert!("audit_log/*".parse::<Resource>().is_ok());
    }

    #[test]
    fn rejects_typos_and_bad_paths() {
        assert!(matches!(
            "patients".parse::<Resource>(),
            Err(VocabularyError::Unknown { .. })
        ));
        assert!("patient/".parse::<Resource>().is_err());
        assert!("patient//x".parse::<Resource>().is_err());
        assert!("patient/*/notes".parse::<Resource>().is_err());
        assert!("patient/ab*".parse::<Resource>().is_err());
        assert!("*/x".parse::<Resource>().is_err());
        assert!("patient/a b".parse::<Resource>().is_err());
    }

    #[test]
    fn object_builder_formats_path() {
        let r = Resource::object(ResourceKind::Invoice, 7);
        assert_eq!(r.as_str(), "invoice/7");
        assert_eq!(r.as_str().parse::<Resource>().unwrap(), r);
    }
}

use serde::{Deserialize, Serialize};

use super::{VocabularyError, VocabularyKind, WILDCARD, is_clean_segment};

/// Action verbs. A verb may carry a parameter (`export:csv`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    Read,
    List,
    Create,
    Update,
    Delete,
    Manage,
    Invite,
    Assign,
    Export,
    Approve,
    Refund,
    #[serde(rename = "*")]
    Any,
}

impl Verb {
    pub const ALL: [Verb; 12] = [
        Verb::Read,
        Verb::List,
        Verb::Create,
        Verb::Update,
        Verb::Delete,
        Verb::Manage,
        Verb::Invite,
        Verb::Assign,
        Verb::Export,
        Verb::Approve,
        Verb::Refund,
        Verb::Any,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Read => "read",
            Verb::List => "list",
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::Delete => "delete",
            Verb::Manage => "manage",
            Verb::Invite => "invite",
            Verb::Assign => "assign",
            Verb::Export => "export",
            Verb::Approve => "approve",
            Verb::Refund => "refund",
            Verb::Any => WILDCARD,
        }
    }

    fn lookup(value: &str) -> Option<Verb> {
        Verb::ALL.into_iter().find(|v| v.as_str() == value)
    }
}

impl core::fmt::Display for Verb {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated action: `verb` or `verb:parameter`.
///
/// In permission rows the parameter may contain `*` globs (`export:*`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Action {
    verb: Verb,
    raw: String,
}

impl Action {
    pub fn verb(verb: Verb) -> Self {
        Self {
            verb,
            raw: verb.as_str().to_string(),
        }
    }

    pub fn any() -> Self {
        Self::verb(Verb::Any)
    }

    /// `verb:parameter`, unchecked. `*` in the parameter globs in rows.
    pub fn with_parameter(verb: Verb, parameter: impl core::fmt::Display) -> Self {
        Self {
            verb,
            raw: format!("{}:{}", verb.as_str(), parameter),
        }
    }

    pub fn kind(&self) -> Verb {
        self.verb
    }

    pub fn parameter(&self) -> Option<&str> {
        self.raw.split_once(':').map(|(_, p)| p)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_wildcard(&self) -> bool {
        self.verb == Verb::Any
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl core::str::FromStr for Action {
    type Err = VocabularyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.is_empty() {
            return Err(VocabularyError::Empty(VocabularyKind::Action));
        }

        let (verb_str, param) = match value.split_once(':') {
            Some((v, p)) => (v, Some(p)),
            None => (value, None),
        };

        let verb = Verb::lookup(verb_str)
            .ok_or_else(|| VocabularyError::unknown(VocabularyKind::Action, value))?;

        if let Some(param) = param {
            if verb == Verb::Any {
                return Err(VocabularyError::malformed(
                    VocabularyKind::Action,
                    value,
                    "wildcard action takes no parameter",
                ));
            }
            if !is_clean_segment(param) || param.contains(':') {
                return Err(VocabularyError::malformed(
                    VocabularyKind::Action,
                    value,
                    "parameter must be a single non-empty token",
                ));
            }
        }

        Ok(Self {
            verb,
            raw: value.to_string(),
        })
    }
}

impl Serialize for Action {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_verbs_parse() {
        for verb in Verb::ALL {
            let action: Action = verb.as_str().parse().unwrap();
            assert_eq!(action.kind(), verb);
            assert_eq!(action.parameter(), None);
        }
    }

    #[test]
    fn parameterised_verbs_parse() {
        let action: Action = "export:csv".parse().unwrap();
        assert_eq!(action.kind(), Verb::Export);
        assert_eq!(action.parameter(), Some("csv"));

        let glob: Action = "export:*".parse().unwrap();
        assert_eq!(glob.parameter(), Some("*"));
    }

    #[test]
    fn rejects_unknown_and_malformed() {
        assert!(matches!(
            "destroy".parse::<Action>(),
            Err(VocabularyError::Unknown { .. })
        ));
        assert!(matches!(
            "export:".parse::<Action>(),
            Err(VocabularyError::Malformed { .. })
        ));
        assert!(matches!(
            "*:csv".parse::<Action>(),
            Err(VocabularyError::Malformed { .. })
        ));
        assert!(matches!(
            "export:a:b".parse::<Action>(),
            Err(VocabularyError::Malformed { .. })
        ));
        assert_eq!(
            "".parse::<Action>(),
            Err(VocabularyError::Empty(VocabularyKind::Action))
        );
    }
}

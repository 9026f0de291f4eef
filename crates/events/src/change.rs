use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of one running service instance.
///
/// Generated once at process start and stamped on every notification the
/// instance publishes, so it can recognise (and skip) its own echoes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(Uuid);

impl InstanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Which family of policy rows a change touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Grouping,
    Permission,
    /// Several rows at once (seeding, subject teardown).
    Bulk,
}

/// "Policy changed, reload from the store."
///
/// Carries no policy data: receivers always reload the full set from the
/// store, never patch their cache from the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyChanged {
    pub event_id: Uuid,
    pub origin: InstanceId,
    pub kind: ChangeKind,
    pub occurred_at: DateTime<Utc>,
}

impl PolicyChanged {
    pub fn new(origin: InstanceId, kind: ChangeKind) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            origin,
            kind,
            occurred_at: Utc::now(),
        }
    }

    pub fn is_from(&self, instance: InstanceId) -> bool {
        self.origin == instance
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_uses_snake_case_kind() {
        let event = PolicyChanged::new(InstanceId::new(), ChangeKind::Permission);
        let json = event.to_json().unwrap();
        assert!(json.contains("\"kind\":\"permission\""));
        assert_eq!(PolicyChanged::from_json(&json).unwrap(), event);
    }

    #[test]
    fn origin_check() {
        let me = InstanceId::new();
        let event = PolicyChanged::new(me, ChangeKind::Grouping);
        assert!(event.is_from(me));
        assert!(!event.is_from(InstanceId::new()));
    }
}

//! Policy rows and the read-optimized in-memory projection built from them.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuthzError;
use crate::vocabulary::{Action, Domain, Resource, Role, VocabularyError, VocabularyKind};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    pub fn as_str(self) -> &'static str {
        match self {
            Effect::Allow => "allow",
            Effect::Deny => "deny",
        }
    }
}

impl core::fmt::Display for Effect {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Effect {
    type Err = AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "allow" => Ok(Effect::Allow),
            "deny" => Ok(Effect::Deny),
            "" => Err(AuthzError::invalid("effect must not be empty")),
            other => Err(AuthzError::invalid(format!(
                "unknown effect '{other}' (expected 'allow' or 'deny')"
            ))),
        }
    }
}

/// Grouping row: `subject` holds `role` inside `domain`.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct GroupingPolicy {
    pub subject: String,
    pub role: Role,
    pub domain: Domain,
}

impl GroupingPolicy {
    /// Validate raw fields from the administration surface.
    ///
    /// Grouping is domain-exact, so wildcard roles and wildcard domains are
    /// rejected: such a row could never match a request.
    pub fn parse(subject: &str, role: &str, domain: &str) -> Result<Self, AuthzError> {
        let subject = parse_subject(subject)?;
        let role: Role = role.parse()?;
        if role.is_wildcard() {
            return Err(AuthzError::invalid("role '*' cannot be assigned to a subject"));
        }
        let domain = Domain::parse(domain)?;
        if domain.is_wildcard() {
            return Err(AuthzError::invalid(format!(
                "roles are assigned in a concrete domain, got '{domain}'"
            )));
        }
        Ok(Self {
            subject,
            role,
            domain,
        })
    }
}

impl core::fmt::Display for GroupingPolicy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "g({}, {}, {})", self.subject, self.role, self.domain)
    }
}

/// Permission row: `role` in `domain` gets `effect` for `action` on `resource`.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PermissionPolicy {
    pub role: Role,
    pub domain: Domain,
    pub resource: Resource,
    pub action: Action,
    pub effect: Effect,
}

impl PermissionPolicy {
    pub fn new(role: Role, domain: Domain, resource: Resource, action: Action, effect: Effect) -> Self {
        Self {
            role,
            domain,
            resource,
            action,
            effect,
        }
    }

    pub fn allow(role: Role, domain: Domain, resource: Resource, action: Action) -> Self {
        Self::new(role, domain, resource, action, Effect::Allow)
    }

    pub fn deny(role: Role, domain: Domain, resource: Resource, action: Action) -> Self {
        Self::new(role, domain, resource, action, Effect::Deny)
    }

    /// Validate raw fields from the administration surface.
    pub fn parse(
        role: &str,
        domain: &str,
        resource: &str,
        action: &str,
        effect: &str,
    ) -> Result<Self, AuthzError> {
        Ok(Self {
            role: role.parse()?,
            domain: Domain::parse(domain)?,
            resource: resource.parse()?,
            action: action.parse()?,
            effect: effect.parse()?,
        })
    }

    /// Typed rows can still carry unchecked values from the builders. A row
    /// is accepted only if every field reads back through its parser, since
    /// that is how the store loads it.
    pub fn validate(&self) -> Result<(), AuthzError> {
        if !self.domain.is_valid() {
            return Err(VocabularyError::Unknown {
                kind: VocabularyKind::Domain,
                value: self.domain.to_string(),
            }
            .into());
        }
        self.resource.as_str().parse::<Resource>()?;
        self.action.as_str().parse::<Action>()?;
        Ok(())
    }
}

impl core::fmt::Display for PermissionPolicy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "p({}, {}, {}, {}, {})",
            self.role, self.domain, self.resource, self.action, self.effect
        )
    }
}

pub(crate) fn check_subject(subject: &str) -> Result<(), AuthzError> {
    let trimmed = subject.trim();
    if trimmed.is_empty() {
        return Err(AuthzError::invalid("subject must not be empty"));
    }
    if trimmed.len() != subject.len() {
        return Err(AuthzError::invalid("subject must not have surrounding whitespace"));
    }
    Ok(())
}

pub(crate) fn parse_subject(subject: &str) -> Result<String, AuthzError> {
    check_subject(subject)?;
    Ok(subject.to_string())
}

/// Every row the store holds, as loaded in one read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySnapshot {
    pub groupings: BTreeSet<GroupingPolicy>,
    pub permissions: BTreeSet<PermissionPolicy>,
}

/// Immutable, indexed view of one [`PolicySnapshot`].
///
/// This is the engine's cache. It is never mutated after construction; a
/// reload builds a new one and swaps it in whole.
#[derive(Debug)]
pub struct PolicySet {
    /// subject -> domain -> roles
    roles: HashMap<String, HashMap<Domain, BTreeSet<Role>>>,
    /// role -> permission rows naming it (`Role::Any` rows under their own key)
    by_role: HashMap<Role, Vec<PermissionPolicy>>,
    snapshot: PolicySnapshot,
    revision: u64,
    loaded_at: DateTime<Utc>,
}

impl PolicySet {
    pub fn empty() -> Self {
        Self::from_snapshot(PolicySnapshot::default(), 0)
    }

    pub fn from_snapshot(snapshot: PolicySnapshot, revision: u64) -> Self {
        let mut roles: HashMap<String, HashMap<Domain, BTreeSet<Role>>> = HashMap::new();
        for g in &snapshot.groupings {
            roles
                .entry(g.subject.clone())
                .or_default()
                .entry(g.domain.clone())
                .or_default()
                .insert(g.role);
        }

        let mut by_role: HashMap<Role, Vec<PermissionPolicy>> = HashMap::new();
        for p in &snapshot.permissions {
            by_role.entry(p.role).or_default().push(p.clone());
        }

        Self {
            roles,
            by_role,
            snapshot,
            revision,
            loaded_at: Utc::now(),
        }
    }

    /// Roles held by `subject` in exactly `domain`, sorted.
    pub fn roles_for(&self, subject: &str, domain: &Domain) -> Vec<Role> {
        self.roles
            .get(subject)
            .and_then(|by_domain| by_domain.get(domain))
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn has_role(&self, subject: &str, role: Role, domain: &Domain) -> bool {
        self.roles
            .get(subject)
            .and_then(|by_domain| by_domain.get(domain))
            .is_some_and(|set| set.contains(&role))
    }

    /// Permission rows whose role column is exactly `role`.
    pub fn permissions_for(&self, role: Role) -> &[PermissionPolicy] {
        self.by_role.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn groupings(&self) -> impl Iterator<Item = &GroupingPolicy> {
        self.snapshot.groupings.iter()
    }

    pub fn permissions(&self) -> impl Iterator<Item = &PermissionPolicy> {
        self.snapshot.permissions.iter()
    }

    pub fn snapshot(&self) -> &PolicySnapshot {
        &self.snapshot
    }

    pub fn grouping_count(&self) -> usize {
        self.snapshot.groupings.len()
    }

    pub fn permission_count(&self) -> usize {
        self.snapshot.permissions.len()
    }

    /// Monotonic per-process reload counter; 0 is the empty boot set.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

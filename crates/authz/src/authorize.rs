use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{AuthzError, AuthzResult, BatchError};
use crate::policy::PermissionPolicy;
use crate::vocabulary::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// Subject holds the superadmin role in `sys`; no rule was evaluated.
    SuperadminBypass,
    AllowRule,
    /// At least one deny row matched (deny overrides allow).
    DenyRule,
    /// Subject holds no role in the request domain.
    NoRoleInDomain,
    NoMatchingRule,
}

impl DecisionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SuperadminBypass => "superadmin_bypass",
            Self::AllowRule => "allow_rule",
            Self::DenyRule => "deny_rule",
            Self::NoRoleInDomain => "no_role_in_domain",
            Self::NoMatchingRule => "no_matching_rule",
        }
    }
}

/// Outcome of one enforcement call, with the rows that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub allowed: bool,
    pub reason: DecisionReason,
    /// Roles held by the subject in the request domain.
    pub roles: Vec<Role>,
    pub allow_matches: Vec<PermissionPolicy>,
    pub deny_matches: Vec<PermissionPolicy>,
}

impl Decision {
    pub(crate) fn bypass(role: Role) -> Self {
        Self {
            allowed: true,
            reason: DecisionReason::SuperadminBypass,
            roles: vec![role],
            allow_matches: Vec::new(),
            deny_matches: Vec::new(),
        }
    }

    pub(crate) fn evaluated(
        roles: Vec<Role>,
        allow_matches: Vec<PermissionPolicy>,
        deny_matches: Vec<PermissionPolicy>,
    ) -> Self {
        let reason = if roles.is_empty() {
            DecisionReason::NoRoleInDomain
        } else if !deny_matches.is_empty() {
            DecisionReason::DenyRule
        } else if !allow_matches.is_empty() {
            DecisionReason::AllowRule
        } else {
            DecisionReason::NoMatchingRule
        };
        Self {
            allowed: reason == DecisionReason::AllowRule,
            reason,
            roles,
            allow_matches,
            deny_matches,
        }
    }
}

/// Request-path authorization.
///
/// Arguments are raw strings from the caller. Malformed input is an
/// [`AuthzError::InvalidArguments`], never a silent `false`.
pub trait PolicyEnforcer: Send + Sync {
    fn enforce_ex(
        &self,
        subject: &str,
        domain: &str,
        resource: &str,
        action: &str,
    ) -> AuthzResult<Decision>;

    fn enforce(&self, subject: &str, domain: &str, resource: &str, action: &str) -> AuthzResult<bool> {
        self.enforce_ex(subject, domain, resource, action)
            .map(|decision| decision.allowed)
    }

    /// `Ok(())` when allowed, [`AuthzError::Forbidden`] when denied.
    fn must_enforce(&self, subject: &str, domain: &str, resource: &str, action: &str) -> AuthzResult<()> {
        if self.enforce(subject, domain, resource, action)? {
            Ok(())
        } else {
            Err(AuthzError::Forbidden)
        }
    }
}

/// Role and permission administration.
///
/// Mutations validate every field before touching storage, are idempotent,
/// and return whether a row actually changed. A change is visible to
/// enforcement on this instance before the call returns.
#[async_trait]
pub trait PolicyAdmin: Send + Sync {
    async fn add_role_for_user_in_domain(&self, subject: &str, role: &str, domain: &str) -> AuthzResult<bool>;

    async fn remove_role_for_user_in_domain(&self, subject: &str, role: &str, domain: &str) -> AuthzResult<bool>;

    /// Cached view; no store round-trip.
    fn get_roles_for_user_in_domain(&self, subject: &str, domain: &str) -> AuthzResult<Vec<Role>>;

    /// Permission rows naming `role` that apply in `domain`. A wildcard
    /// `domain` lists the template rows stored under exactly that domain.
    fn get_permissions_for_role_in_domain(&self, role: &str, domain: &str) -> AuthzResult<Vec<PermissionPolicy>>;

    async fn add_permission(
        &self,
        role: &str,
        domain: &str,
        resource: &str,
        action: &str,
        effect: &str,
    ) -> AuthzResult<bool>;

    async fn remove_permission(
        &self,
        role: &str,
        domain: &str,
        resource: &str,
        action: &str,
        effect: &str,
    ) -> AuthzResult<bool>;

    /// Add typed rows in order, stopping at the first failure. Returns how
    /// many rows were new.
    async fn add_permissions(&self, rules: &[PermissionPolicy]) -> Result<usize, BatchError>;

    /// Drop every role assignment of `subject`, in every domain.
    async fn remove_subject(&self, subject: &str) -> AuthzResult<u64>;
}

/// Both halves of the authorization surface behind one object.
pub trait Authorizer: PolicyEnforcer + PolicyAdmin {}

impl<T> Authorizer for T where T: PolicyEnforcer + PolicyAdmin + ?Sized {}

impl<E> PolicyEnforcer for Arc<E>
where
    E: PolicyEnforcer + ?Sized,
{
    fn enforce_ex(&self, subject: &str, domain: &str, resource: &str, action: &str) -> AuthzResult<Decision> {
        (**self).enforce_ex(subject, domain, resource, action)
    }

    fn enforce(&self, subject: &str, domain: &str, resource: &str, action: &str) -> AuthzResult<bool> {
        (**self).enforce(subject, domain, resource, action)
    }

    fn must_enforce(&self, subject: &str, domain: &str, resource: &str, action: &str) -> AuthzResult<()> {
        (**self).must_enforce(subject, domain, resource, action)
    }
}

#[async_trait]
impl<A> PolicyAdmin for Arc<A>
where
    A: PolicyAdmin + ?Sized,
{
    async fn add_role_for_user_in_domain(&self, subject: &str, role: &str, domain: &str) -> AuthzResult<bool> {
        (**self).add_role_for_user_in_domain(subject, role, domain).await
    }

    async fn remove_role_for_user_in_domain(&self, subject: &str, role: &str, domain: &str) -> AuthzResult<bool> {
        (**self).remove_role_for_user_in_domain(subject, role, domain).await
    }

    fn get_roles_for_user_in_domain(&self, subject: &str, domain: &str) -> AuthzResult<Vec<Role>> {
        (**self).get_roles_for_user_in_domain(subject, domain)
    }

    fn get_permissions_for_role_in_domain(&self, role: &str, domain: &str) -> AuthzResult<Vec<PermissionPolicy>> {
        (**self).get_permissions_for_role_in_domain(role, domain)
    }

    async fn add_permission(
        &self,
        role: &str,
        domain: &str,
        resource: &str,
        action: &str,
        effect: &str,
    ) -> AuthzResult<bool> {
        (**self).add_permission(role, domain, resource, action, effect).await
    }

    async fn remove_permission(
        &self,
        role: &str,
        domain: &str,
        resource: &str,
        action: &str,
        effect: &str,
    ) -> AuthzResult<bool> {
        (**self).remove_permission(role, domain, resource, action, effect).await
    }

    async fn add_permissions(&self, rules: &[PermissionPolicy]) -> Result<usize, BatchError> {
        (**self).add_permissions(rules).await
    }

    async fn remove_subject(&self, subject: &str) -> AuthzResult<u64> {
        (**self).remove_subject(subject).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocabulary::{Action, Domain, Resource};

    struct Fixed(bool);

    impl PolicyEnforcer for Fixed {
        fn enforce_ex(&self, _: &str, _: &str, _: &str, _: &str) -> AuthzResult<Decision> {
            let row = PermissionPolicy::allow(Role::Owner, Domain::any(), Resource::any(), Action::any());
            Ok(if self.0 {
                Decision::evaluated(vec![Role::Owner], vec![row], vec![])
            } else {
                Decision::evaluated(vec![], vec![], vec![])
            })
        }
    }

    #[test]
    fn must_enforce_maps_denial_to_forbidden() {
        assert!(Fixed(true).must_enforce("s", "sys", "clinic", "read").is_ok());
        let err = Fixed(false).must_enforce("s", "sys", "clinic", "read").unwrap_err();
        assert!(err.is_forbidden());
    }

    #[test]
    fn deny_outranks_allow_in_reason() {
        let row = PermissionPolicy::allow(Role::Owner, Domain::any(), Resource::any(), Action::any());
        let d = Decision::evaluated(vec![Role::Owner], vec![row.clone()], vec![row]);
        assert!(!d.allowed);
        assert_eq!(d.reason, DecisionReason::DenyRule);

        let d = Decision::evaluated(vec![Role::Owner], vec![], vec![]);
        assert_eq!(d.reason, DecisionReason::NoMatchingRule);
    }
}

//! API-side authorization guard.
//!
//! Handlers call [`require`] before touching any business logic, so the
//! decision is made at the route boundary against the live policy set.

use clinicos_authz::{AuthzError, PolicyEnforcer};

use crate::context::PrincipalContext;

/// Check that the current principal may perform `action` on `resource` in
/// `domain`. A denial is `AuthzError::Forbidden`.
pub fn require<E>(
    enforcer: &E,
    principal: &PrincipalContext,
    domain: &str,
    resource: &str,
    action: &str,
) -> Result<(), AuthzError>
where
    E: PolicyEnforcer + ?Sized,
{
    enforcer.must_enforce(principal.subject(), domain, resource, action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinicos_authz::{Decision, AuthzResult};

    struct Fixed(bool);

    impl PolicyEnforcer for Fixed {
        fn enforce_ex(&self, _: &str, _: &str, _: &str, _: &str) -> AuthzResult<Decision> {
            Err(AuthzError::invalid("not used"))
        }

        fn enforce(&self, _: &str, _: &str, _: &str, _: &str) -> AuthzResult<bool> {
            Ok(self.0)
        }
    }

    #[test]
    fn denial_is_forbidden() {
        let who = PrincipalContext::new("alice");
        assert!(require(&Fixed(true), &who, "sys", "policy", "read").is_ok());
        assert!(matches!(
            require(&Fixed(false), &who, "sys", "policy", "read"),
            Err(AuthzError::Forbidden)
        ));
    }
}

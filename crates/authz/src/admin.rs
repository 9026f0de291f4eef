//! [`PolicyAdmin`] for the [`Enforcer`]: validate, write through the store,
//! then reload and notify peers.

use async_trait::async_trait;
use tracing::debug;

use clinicos_events::ChangeKind;

use crate::authorize::PolicyAdmin;
use crate::engine::Enforcer;
use crate::error::{AuthzError, AuthzResult, BatchError};
use crate::matcher;
use crate::policy::{GroupingPolicy, PermissionPolicy, check_subject};
use crate::store::PolicyStore;
use crate::vocabulary::{Domain, Role};

#[async_trait]
impl PolicyAdmin for Enforcer {
    async fn add_role_for_user_in_domain(&self, subject: &str, role: &str, domain: &str) -> AuthzResult<bool> {
        let rule = GroupingPolicy::parse(subject, role, domain)?;
        let _gate = self.write_gate.lock().await;
        let added = self.store().add_grouping(&rule).await?;
        debug!(%rule, added, "grouping write");
        self.commit(added, ChangeKind::Grouping).await?;
        Ok(added)
    }

    async fn remove_role_for_user_in_domain(&self, subject: &str, role: &str, domain: &str) -> AuthzResult<bool> {
        let rule = GroupingPolicy::parse(subject, role, domain)?;
        let _gate = self.write_gate.lock().await;
        let removed = self.store().remove_grouping(&rule).await?;
        debug!(%rule, removed, "grouping delete");
        self.commit(removed, ChangeKind::Grouping).await?;
        Ok(removed)
    }

    fn get_roles_for_user_in_domain(&self, subject: &str, domain: &str) -> AuthzResult<Vec<Role>> {
        check_subject(subject)?;
        let domain = Domain::parse(domain)?;
        Ok(self.policy_handle().roles_for(subject, &domain))
    }

    fn get_permissions_for_role_in_domain(&self, role: &str, domain: &str) -> AuthzResult<Vec<PermissionPolicy>> {
        let role: Role = role.parse()?;
        let domain = Domain::parse(domain)?;
        let set = self.policy_handle();
        Ok(set
            .permissions_for(role)
            .iter()
            .filter(|rule| matcher::domain_matches(&rule.domain, &domain))
            .cloned()
            .collect())
    }

    async fn add_permission(
        &self,
        role: &str,
        domain: &str,
        resource: &str,
        action: &str,
        effect: &str,
    ) -> AuthzResult<bool> {
        let rule = PermissionPolicy::parse(role, domain, resource, action, effect)?;
        let _gate = self.write_gate.lock().await;
        let added = self.store().add_permission(&rule).await?;
        debug!(%rule, added, "permission write");
        self.commit(added, ChangeKind::Permission).await?;
        Ok(added)
    }

    async fn remove_permission(
        &self,
        role: &str,
        domain: &str,
        resource: &str,
        action: &str,
        effect: &str,
    ) -> AuthzResult<bool> {
        let rule = PermissionPolicy::parse(role, domain, resource, action, effect)?;
        let _gate = self.write_gate.lock().await;
        let removed = self.store().remove_permission(&rule).await?;
        debug!(%rule, removed, "permission delete");
        self.commit(removed, ChangeKind::Permission).await?;
        Ok(removed)
    }

    async fn add_permissions(&self, rules: &[PermissionPolicy]) -> Result<usize, BatchError> {
        // Reject malformed input before anything is written.
        for (index, rule) in rules.iter().enumerate() {
            rule.validate().map_err(|source| BatchError {
                index,
                rule: rule.to_string(),
                applied: 0,
                source,
            })?;
        }

        let _gate = self.write_gate.lock().await;
        let mut applied = 0;
        let mut failure = None;
        for (index, rule) in rules.iter().enumerate() {
            match self.store().add_permission(rule).await {
                Ok(true) => applied += 1,
                Ok(false) => {}
                Err(err) => {
                    failure = Some(BatchError {
                        index,
                        rule: rule.to_string(),
                        applied,
                        source: AuthzError::from(err),
                    });
                    break;
                }
            }
        }

        // One reload and one event for the whole batch, even a partial one.
        let committed = self.commit(applied > 0, ChangeKind::Bulk).await;
        if let Some(failure) = failure {
            return Err(failure);
        }
        committed.map_err(|source| BatchError {
            index: rules.len(),
            rule: "<reload>".to_string(),
            applied,
            source,
        })?;
        Ok(applied)
    }

    async fn remove_subject(&self, subject: &str) -> AuthzResult<u64> {
        check_subject(subject)?;
        let _gate = self.write_gate.lock().await;
        let removed = self.store().remove_subject(subject).await?;
        debug!(subject, removed, "subject removed");
        self.commit(removed > 0, ChangeKind::Grouping).await?;
        Ok(removed)
    }
}

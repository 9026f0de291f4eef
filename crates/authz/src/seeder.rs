//! Baseline policy set installed at boot.
//!
//! Rows are written through [`PolicyAdmin::add_permissions`], so seeding is
//! idempotent and safe to run on every instance at every start.

use serde::Serialize;
use tracing::info;

use crate::authorize::PolicyAdmin;
use crate::error::BatchError;
use crate::policy::PermissionPolicy;
use crate::vocabulary::{Action, Domain, DomainPrefix, Resource, ResourceKind, Role, Verb};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    /// Rows in the baseline.
    pub total: usize,
    /// Rows that were not already present.
    pub added: usize,
}

fn kind(kind: ResourceKind) -> Resource {
    Resource::kind_only(kind)
}

fn any_path(kind: ResourceKind) -> Resource {
    Resource::object(kind, "*")
}

fn verb(verb: Verb) -> Action {
    Action::verb(verb)
}

fn allow_each(
    rows: &mut Vec<PermissionPolicy>,
    role: Role,
    domain: &Domain,
    grants: &[(ResourceKind, &[Verb])],
) {
    for (resource, verbs) in grants {
        for v in *verbs {
            rows.push(PermissionPolicy::allow(role, domain.clone(), kind(*resource), verb(*v)));
        }
    }
}

/// The baseline rows, in install order.
pub fn baseline_policies() -> Vec<PermissionPolicy> {
    use ResourceKind as R;
    use Verb as V;

    let sys = Domain::system();
    let clinic = Domain::any_of(DomainPrefix::Clinic);
    let project = Domain::any_of(DomainPrefix::Project);
    let user = Domain::any_of(DomainPrefix::User);

    let mut rows = Vec::new();

    // Platform support staff: read-mostly across the system domain.
    allow_each(
        &mut rows,
        Role::Support,
        &sys,
        &[
            (R::Clinic, &[V::Read, V::List]),
            (R::Member, &[V::Read, V::List]),
            (R::AuditLog, &[V::Read, V::List]),
            (R::Report, &[V::Read]),
        ],
    );

    // Clinic template.
    rows.push(PermissionPolicy::allow(Role::Owner, clinic.clone(), Resource::any(), Action::any()));
    rows.push(PermissionPolicy::deny(Role::Owner, clinic.clone(), kind(R::AuditLog), verb(V::Delete)));
    rows.push(PermissionPolicy::deny(Role::Admin, clinic.clone(), kind(R::AuditLog), verb(V::Delete)));
    allow_each(
        &mut rows,
        Role::Admin,
        &clinic,
        &[
            (R::Member, &[V::Manage, V::Invite, V::Assign]),
            (R::Role, &[V::Read, V::List, V::Assign]),
            (R::Settings, &[V::Read, V::Update]),
            (R::Schedule, &[V::Manage]),
            (R::AuditLog, &[V::Read, V::List]),
        ],
    );
    allow_each(
        &mut rows,
        Role::Doctor,
        &clinic,
        &[
            (R::Appointment, &[V::Read, V::List, V::Update]),
            (R::Schedule, &[V::Read, V::List]),
            (R::Message, &[V::Read, V::Create]),
        ],
    );
    rows.push(PermissionPolicy::allow(Role::Doctor, clinic.clone(), any_path(R::Patient), verb(V::Read)));
    rows.push(PermissionPolicy::allow(Role::Doctor, clinic.clone(), any_path(R::Patient), verb(V::Update)));
    rows.push(PermissionPolicy::allow(Role::Doctor, clinic.clone(), kind(R::Patient), verb(V::List)));
    rows.push(PermissionPolicy::deny(Role::Doctor, clinic.clone(), kind(R::Payment), Action::any()));
    allow_each(
        &mut rows,
        Role::Nurse,
        &clinic,
        &[
            (R::Appointment, &[V::Read, V::List]),
            (R::Schedule, &[V::Read, V::List]),
        ],
    );
    rows.push(PermissionPolicy::allow(Role::Nurse, clinic.clone(), any_path(R::Patient), verb(V::Read)));
    allow_each(
        &mut rows,
        Role::Receptionist,
        &clinic,
        &[
            (R::Appointment, &[V::Read, V::List, V::Create, V::Update, V::Delete]),
            (R::Schedule, &[V::Read, V::List, V::Update]),
            (R::Patient, &[V::List, V::Create]),
            (R::Message, &[V::Read, V::Create]),
        ],
    );
    allow_each(
        &mut rows,
        Role::Accountant,
        &clinic,
        &[
            (R::Payment, &[V::Read, V::List, V::Refund]),
            (R::Invoice, &[V::Read, V::List, V::Create, V::Update, V::Approve]),
            (R::Report, &[V::Read]),
        ],
    );
    rows.push(PermissionPolicy::allow(
        Role::Accountant,
        clinic.clone(),
        kind(R::Report),
        Action::with_parameter(V::Export, "*"),
    ));
    allow_each(
        &mut rows,
        Role::Member,
        &clinic,
        &[
            (R::Clinic, &[V::Read]),
            (R::Schedule, &[V::Read]),
        ],
    );

    // Project template.
    rows.push(PermissionPolicy::allow(Role::Owner, project.clone(), Resource::any(), Action::any()));
    allow_each(
        &mut rows,
        Role::Member,
        &project,
        &[
            (R::Project, &[V::Read]),
            (R::Chat, &[V::Read, V::Create]),
        ],
    );

    // Self scope: every user manages their own profile and inbox.
    allow_each(
        &mut rows,
        Role::SelfScope,
        &user,
        &[
            (R::Profile, &[V::Read, V::Update]),
            (R::Message, &[V::Read, V::List, V::Create, V::Delete]),
        ],
    );

    rows
}

/// Install [`baseline_policies`] through `admin`.
///
/// Stops at the first failing row; earlier rows stay installed, and a rerun
/// picks up where it left off.
pub async fn seed<A>(admin: &A) -> Result<SeedReport, BatchError>
where
    A: PolicyAdmin + ?Sized,
{
    let rows = baseline_policies();
    let added = admin.add_permissions(&rows).await?;
    let report = SeedReport {
        total: rows.len(),
        added,
    };
    info!(total = report.total, added = report.added, "baseline policies seeded");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::authorize::PolicyEnforcer;
    use crate::engine::Enforcer;
    use crate::health::HealthTracker;
    use crate::store::InMemoryPolicyStore;
    use uuid::Uuid;

    async fn engine() -> Enforcer {
        Enforcer::builder(Arc::new(InMemoryPolicyStore::new()))
            .health(Arc::new(HealthTracker::new()))
            .build()
            .await
            .unwrap()
    }

    #[test]
    fn baseline_is_valid_and_duplicate_free() {
        let rows = baseline_policies();
        for row in &rows {
            row.validate().unwrap();
        }
        let unique: std::collections::BTreeSet<_> = rows.iter().collect();
        assert_eq!(unique.len(), rows.len());
    }

    #[tokio::test]
    async fn seeding_twice_equals_seeding_once() {
        let e = engine().await;
        let first = seed(&e).await.unwrap();
        assert_eq!(first.added, first.total);
        let once = e.policy_handle().snapshot().clone();

        let second = seed(&e).await.unwrap();
        assert_eq!(second.added, 0);
        assert_eq!(e.policy_handle().snapshot(), &once);
    }

    #[tokio::test]
    async fn clinic_template_behaves() {
        let e = engine().await;
        seed(&e).await.unwrap();
        let c = format!("clinic:{}", Uuid::now_v7());
        let u = format!("user:{}", Uuid::now_v7());
        e.add_role_for_user_in_domain("owner-1", "owner", &c).await.unwrap();
        e.add_role_for_user_in_domain("doc-1", "doctor", &c).await.unwrap();
        e.add_role_for_user_in_domain("acct-1", "accountant", &c).await.unwrap();
        e.add_role_for_user_in_domain("u-1", "self", &u).await.unwrap();

        assert!(e.enforce("owner-1", &c, "settings", "update").unwrap());
        assert!(!e.enforce("owner-1", &c, "audit_log", "delete").unwrap());
        assert!(e.enforce("doc-1", &c, "patient/7", "read").unwrap());
        assert!(!e.enforce("doc-1", &c, "payment", "read").unwrap());
        assert!(e.enforce("acct-1", &c, "report", "export:csv").unwrap());
        assert!(e.enforce("u-1", &u, "profile", "update").unwrap());
        assert!(!e.enforce("u-1", &c, "profile", "update").unwrap());
    }
}

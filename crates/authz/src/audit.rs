//! Audit logging around any enforcement/administration implementation.
//!
//! [`Audited`] only observes: results pass through untouched, and logging
//! never fails a call.

use std::time::Instant;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::authorize::{Decision, DecisionReason, PolicyAdmin, PolicyEnforcer};
use crate::error::{AuthzError, AuthzResult, BatchError};
use crate::policy::PermissionPolicy;
use crate::vocabulary::Role;

const TARGET: &str = "clinicos::authz::audit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Severity {
    Info,
    Warn,
    Error,
}

struct Entry<'a> {
    op: &'static str,
    subject: &'a str,
    domain: &'a str,
    resource: &'a str,
    action: &'a str,
    role: &'a str,
    reason: &'static str,
}

impl Entry<'_> {
    fn emit(&self, severity: Severity, outcome: &str, started: Instant) {
        let elapsed_us = started.elapsed().as_micros() as u64;
        let Entry {
            op,
            subject,
            domain,
            resource,
            action,
            role,
            reason,
        } = *self;
        match severity {
            Severity::Info => info!(target: TARGET, op, subject, domain, resource, action, role, reason, outcome, elapsed_us, "authz"),
            Severity::Warn => warn!(target: TARGET, op, subject, domain, resource, action, role, reason, outcome, elapsed_us, "authz"),
            Severity::Error => error!(target: TARGET, op, subject, domain, resource, action, role, reason, outcome, elapsed_us, "authz"),
        }
    }
}

/// The bypass gets its own outcome so it never reads like a rule match.
fn decision_outcome(result: Result<&Decision, &AuthzError>) -> (Severity, String) {
    match result {
        Ok(d) if d.reason == DecisionReason::SuperadminBypass => {
            (Severity::Info, format!("allow({})", d.reason.as_str()))
        }
        Ok(d) if d.allowed => (Severity::Info, "allow".to_string()),
        Ok(_) => (Severity::Warn, "deny".to_string()),
        Err(err) => (Severity::Error, format!("error: {err}")),
    }
}

fn write_outcome(result: &AuthzResult<bool>, changed: &'static str) -> (Severity, String) {
    match result {
        Ok(true) => (Severity::Info, changed.to_string()),
        Ok(false) => (Severity::Warn, "unchanged".to_string()),
        Err(err) => (Severity::Error, format!("error: {err}")),
    }
}

/// Decorator logging every call on the wrapped implementation.
#[derive(Debug, Clone)]
pub struct Audited<A> {
    inner: A,
}

impl<A> Audited<A> {
    pub fn new(inner: A) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    pub fn into_inner(self) -> A {
        self.inner
    }
}

impl<A: PolicyEnforcer> Audited<A> {
    fn audit_decision(
        &self,
        op: &'static str,
        subject: &str,
        domain: &str,
        resource: &str,
        action: &str,
    ) -> AuthzResult<Decision> {
        let started = Instant::now();
        let result = self.inner.enforce_ex(subject, domain, resource, action);
        let entry = Entry {
            op,
            subject,
            domain,
            resource,
            action,
            role: "",
            reason: result.as_ref().map_or("", |d| d.reason.as_str()),
        };
        let (severity, outcome) = decision_outcome(result.as_ref());
        entry.emit(severity, &outcome, started);
        result
    }
}

impl<A: PolicyEnforcer> PolicyEnforcer for Audited<A> {
    fn enforce_ex(&self, subject: &str, domain: &str, resource: &str, action: &str) -> AuthzResult<Decision> {
        self.audit_decision("enforce_ex", subject, domain, resource, action)
    }

    fn enforce(&self, subject: &str, domain: &str, resource: &str, action: &str) -> AuthzResult<bool> {
        self.audit_decision("enforce", subject, domain, resource, action)
            .map(|d| d.allowed)
    }

    fn must_enforce(&self, subject: &str, domain: &str, resource: &str, action: &str) -> AuthzResult<()> {
        let allowed = self.audit_decision("must_enforce", subject, domain, resource, action)?.allowed;
        if allowed {
            Ok(())
        } else {
            Err(AuthzError::Forbidden)
        }
    }
}

#[async_trait]
impl<A: PolicyAdmin> PolicyAdmin for Audited<A> {
    async fn add_role_for_user_in_domain(&self, subject: &str, role: &str, domain: &str) -> AuthzResult<bool> {
        let started = Instant::now();
        let result = self.inner.add_role_for_user_in_domain(subject, role, domain).await;
        let (severity, outcome) = write_outcome(&result, "added");
        Entry {
            op: "add_role_for_user_in_domain",
            subject,
            domain,
            resource: "",
            action: "",
            role,
            reason: "",
        }
        .emit(severity, &outcome, started);
        result
    }

    async fn remove_role_for_user_in_domain(&self, subject: &str, role: &str, domain: &str) -> AuthzResult<bool> {
        let started = Instant::now();
        let result = self.inner.remove_role_for_user_in_domain(subject, role, domain).await;
        let (severity, outcome) = write_outcome(&result, "removed");
        Entry {
            op: "remove_role_for_user_in_domain",
            subject,
            domain,
            resource: "",
            action: "",
            role,
            reason: "",
        }
        .emit(severity, &outcome, started);
        result
    }

    fn get_roles_for_user_in_domain(&self, subject: &str, domain: &str) -> AuthzResult<Vec<Role>> {
        // Read-only; not audited.
        self.inner.get_roles_for_user_in_domain(subject, domain)
    }

    fn get_permissions_for_role_in_domain(&self, role: &str, domain: &str) -> AuthzResult<Vec<PermissionPolicy>> {
        self.inner.get_permissions_for_role_in_domain(role, domain)
    }

    async fn add_permission(
        &self,
        role: &str,
        domain: &str,
        resource: &str,
        action: &str,
        effect: &str,
    ) -> AuthzResult<bool> {
        let started = Instant::now();
        let result = self.inner.add_permission(role, domain, resource, action, effect).await;
        let (severity, outcome) = write_outcome(&result, "added");
        Entry {
            op: "add_permission",
            subject: "",
            domain,
            resource,
            action,
            role,
            reason: "",
        }
        .emit(severity, &outcome, started);
        result
    }

    async fn remove_permission(
        &self,
        role: &str,
        domain: &str,
        resource: &str,
        action: &str,
        effect: &str,
    ) -> AuthzResult<bool> {
        let started = Instant::now();
        let result = self.inner.remove_permission(role, domain, resource, action, effect).await;
        let (severity, outcome) = write_outcome(&result, "removed");
        Entry {
            op: "remove_permission",
            subject: "",
            domain,
            resource,
            action,
            role,
            reason: "",
        }
        .emit(severity, &outcome, started);
        result
    }

    async fn add_permissions(&self, rules: &[PermissionPolicy]) -> Result<usize, BatchError> {
        let started = Instant::now();
        let result = self.inner.add_permissions(rules).await;
        let (severity, outcome) = match &result {
            Ok(0) => (Severity::Warn, "unchanged".to_string()),
            Ok(n) => (Severity::Info, format!("added {n}/{}", rules.len())),
            Err(err) => (Severity::Error, format!("error: {err}")),
        };
        Entry {
            op: "add_permissions",
            subject: "",
            domain: "",
            resource: "",
            action: "",
            role: "",
            reason: "",
        }
        .emit(severity, &outcome, started);
        result
    }

    async fn remove_subject(&self, subject: &str) -> AuthzResult<u64> {
        let started = Instant::now();
        let result = self.inner.remove_subject(subject).await;
        let (severity, outcome) = match &result {
            Ok(0) => (Severity::Warn, "unchanged".to_string()),
            Ok(n) => (Severity::Info, format!("removed {n}")),
            Err(err) => (Severity::Error, format!("error: {err}")),
        };
        Entry {
            op: "remove_subject",
            subject,
            domain: "",
            resource: "",
            action: "",
            role: "",
            reason: "",
        }
        .emit(severity, &outcome, started);
        result
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::fmt::MakeWriter;
    use uuid::Uuid;

    use super::*;
    use crate::engine::Enforcer;
    use crate::health::HealthTracker;
    use crate::store::InMemoryPolicyStore;

    /// In-memory sink for formatted log lines.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    impl Captured {
        /// Audit lines for `op`, oldest first.
        fn audit_lines(&self, op: &str) -> Vec<String> {
            let bytes = self.0.lock().unwrap().clone();
            let needle = format!("op=\"{op}\"");
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .filter(|line| line.contains(TARGET) && line.contains(&needle))
                .map(str::to_owned)
                .collect()
        }

        fn last(&self, op: &str) -> String {
            self.audit_lines(op).pop().unwrap_or_default()
        }
    }

    fn capture() -> (Captured, tracing::subscriber::DefaultGuard) {
        let sink = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(sink.clone())
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::TRACE)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (sink, guard)
    }

    fn level(line: &str) -> &str {
        line.split_whitespace().next().unwrap_or_default()
    }

    struct Fixture {
        audited: Audited<Arc<Enforcer>>,
        store: Arc<InMemoryPolicyStore>,
        project: String,
    }

    /// `root` is superadmin in sys, `alice` owns a project with chat rights.
    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryPolicyStore::new());
        let e = Enforcer::builder(store.clone())
            .health(Arc::new(HealthTracker::new()))
            .build()
            .await
            .unwrap();
        let project = format!("project:{}", Uuid::now_v7());
        e.add_role_for_user_in_domain("root", "superadmin", "sys").await.unwrap();
        e.add_role_for_user_in_domain("alice", "owner", &project).await.unwrap();
        e.add_permission("owner", &project, "chat", "manage", "allow").await.unwrap();
        Fixture {
            audited: Audited::new(Arc::new(e)),
            store,
            project,
        }
    }

    #[tokio::test]
    async fn results_pass_through_unchanged() {
        let Fixture { audited: a, project: p, .. } = fixture().await;

        assert!(a.add_role_for_user_in_domain("u", "owner", &p).await.unwrap());
        assert!(!a.add_role_for_user_in_domain("u", "owner", &p).await.unwrap());

        assert!(a.enforce("u", &p, "chat", "manage").unwrap());
        assert_eq!(
            a.enforce("u", &p, "chat", "manage").unwrap(),
            a.inner().enforce("u", &p, "chat", "manage").unwrap()
        );
        assert!(a.must_enforce("u", &p, "chat", "delete").unwrap_err().is_forbidden());
        assert!(a.enforce("u", "nope", "chat", "read").unwrap_err().is_invalid_arguments());
        assert_eq!(a.get_roles_for_user_in_domain("u", &p).unwrap(), vec![Role::Owner]);
        assert_eq!(a.remove_subject("u").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn bypass_is_attributed_apart_from_rule_allows() {
        let Fixture { audited: a, project: p, .. } = fixture().await;
        let (logs, _guard) = capture();

        assert!(a.enforce("root", &p, "chat", "manage").unwrap());
        let bypass = logs.last("enforce");
        assert_eq!(level(&bypass), "INFO", "{bypass}");
        assert!(bypass.contains("subject=\"root\""), "{bypass}");
        assert!(bypass.contains("reason=\"superadmin_bypass\""), "{bypass}");
        assert!(bypass.contains("outcome=\"allow(superadmin_bypass)\""), "{bypass}");

        assert!(a.enforce("alice", &p, "chat", "manage").unwrap());
        let rule = logs.last("enforce");
        assert!(rule.contains("subject=\"alice\""), "{rule}");
        assert!(rule.contains("reason=\"allow_rule\""), "{rule}");
        assert!(rule.contains("outcome=\"allow\""), "{rule}");
        assert!(!rule.contains("bypass"), "{rule}");
    }

    #[tokio::test]
    async fn denials_and_errors_are_raised_in_level() {
        let Fixture { audited: a, project: p, .. } = fixture().await;
        let (logs, _guard) = capture();

        assert!(a.must_enforce("bob", &p, "chat", "read").is_err());
        let deny = logs.last("must_enforce");
        assert_eq!(level(&deny), "WARN", "{deny}");
        assert!(deny.contains("reason=\"no_role_in_domain\""), "{deny}");
        assert!(deny.contains("outcome=\"deny\""), "{deny}");

        assert!(a.enforce_ex("alice", "nope", "chat", "read").is_err());
        let failed = logs.last("enforce_ex");
        assert_eq!(level(&failed), "ERROR", "{failed}");
        assert!(failed.contains("reason=\"\""), "{failed}");
        assert!(failed.contains("outcome=\"error: "), "{failed}");
    }

    #[tokio::test]
    async fn writes_log_change_or_no_op() {
        let Fixture {
            audited: a,
            store,
            project: p,
        } = fixture().await;
        let (logs, _guard) = capture();

        assert!(!a.add_role_for_user_in_domain("alice", "owner", &p).await.unwrap());
        let unchanged = logs.last("add_role_for_user_in_domain");
        assert_eq!(level(&unchanged), "WARN", "{unchanged}");
        assert!(unchanged.contains("role=\"owner\""), "{unchanged}");
        assert!(unchanged.contains("outcome=\"unchanged\""), "{unchanged}");

        assert!(a.remove_permission("owner", &p, "chat", "manage", "allow").await.unwrap());
        let removed = logs.last("remove_permission");
        assert_eq!(level(&removed), "INFO", "{removed}");
        assert!(removed.contains("outcome=\"removed\""), "{removed}");

        store.set_unavailable(true);
        assert!(a.add_permission("owner", &p, "chat", "read", "allow").await.is_err());
        let failed = logs.last("add_permission");
        assert_eq!(level(&failed), "ERROR", "{failed}");
        assert!(failed.contains("outcome=\"error: "), "{failed}");
    }

    #[test]
    fn severities() {
        assert_eq!(decision_outcome(Err(&AuthzError::Forbidden)).0, Severity::Error);
        assert_eq!(write_outcome(&Ok(false), "added"), (Severity::Warn, "unchanged".to_string()));
        assert_eq!(write_outcome(&Ok(true), "added"), (Severity::Info, "added".to_string()));
    }
}

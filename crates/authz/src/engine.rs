//! The enforcement engine: an in-memory policy cache in front of a
//! [`PolicyStore`], kept fresh by local writes and peer notifications.
//!
//! Reads never touch the store. A reload builds a whole new [`PolicySet`] and
//! swaps it in, so `enforce` sees either the old set or the new one, never a
//! mix. Writes and reloads on one instance run one at a time behind
//! `write_gate`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use clinicos_events::{ChangeKind, ChangeNotifier, InstanceId, PolicyChanged};

use crate::authorize::{Decision, PolicyEnforcer};
use crate::error::{AuthzError, AuthzResult};
use crate::health::HealthTracker;
use crate::matcher;
use crate::model::ModelDefinition;
use crate::policy::{Effect, PermissionPolicy, PolicySet, check_subject};
use crate::store::PolicyStore;
use crate::vocabulary::{Action, Domain, Resource, Role};

pub const DEFAULT_RELOAD_TIMEOUT: Duration = Duration::from_secs(10);

pub struct EnforcerBuilder {
    store: Arc<dyn PolicyStore>,
    notifier: Option<Arc<dyn ChangeNotifier>>,
    health: Option<Arc<HealthTracker>>,
    model: ModelDefinition,
    instance: Option<InstanceId>,
    reload_timeout: Duration,
}

impl EnforcerBuilder {
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self {
            store,
            notifier: None,
            health: None,
            model: ModelDefinition::default(),
            instance: None,
            reload_timeout: DEFAULT_RELOAD_TIMEOUT,
        }
    }

    /// Publish a change event after every successful write.
    pub fn notifier(mut self, notifier: Arc<dyn ChangeNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Defaults to [`HealthTracker::global`].
    pub fn health(mut self, health: Arc<HealthTracker>) -> Self {
        self.health = Some(health);
        self
    }

    pub fn model(mut self, model: ModelDefinition) -> Self {
        self.model = model;
        self
    }

    pub fn instance(mut self, instance: InstanceId) -> Self {
        self.instance = Some(instance);
        self
    }

    pub fn reload_timeout(mut self, timeout: Duration) -> Self {
        self.reload_timeout = timeout;
        self
    }

    /// Build the engine and perform the initial load.
    ///
    /// Failing to load at boot is fatal: there is no last-known-good set to
    /// fall back on.
    pub async fn build(self) -> AuthzResult<Enforcer> {
        let enforcer = Enforcer {
            cache: RwLock::new(Arc::new(PolicySet::empty())),
            store: self.store,
            notifier: self.notifier,
            health: self.health.unwrap_or_else(HealthTracker::global),
            model: self.model,
            instance: self.instance.unwrap_or_default(),
            write_gate: tokio::sync::Mutex::new(()),
            reload_timeout: self.reload_timeout,
            revision: AtomicU64::new(0),
        };
        enforcer.reload().await?;
        Ok(enforcer)
    }
}

pub struct Enforcer {
    cache: RwLock<Arc<PolicySet>>,
    store: Arc<dyn PolicyStore>,
    notifier: Option<Arc<dyn ChangeNotifier>>,
    health: Arc<HealthTracker>,
    model: ModelDefinition,
    instance: InstanceId,
    pub(crate) write_gate: tokio::sync::Mutex<()>,
    reload_timeout: Duration,
    revision: AtomicU64,
}

impl core::fmt::Debug for Enforcer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Enforcer")
            .field("store", &self.store.backend())
            .field("notifier", &self.notifier.as_ref().map(|n| n.backend()))
            .field("model", &self.model)
            .field("instance", &self.instance)
            .field("revision", &self.revision.load(Ordering::Acquire))
            .finish()
    }
}

impl Enforcer {
    pub fn builder(store: Arc<dyn PolicyStore>) -> EnforcerBuilder {
        EnforcerBuilder::new(store)
    }

    /// The raw cached policy set, for administrative tooling.
    ///
    /// This bypasses the administration surface: the returned snapshot is
    /// immutable and stops reflecting changes at the next reload.
    pub fn policy_handle(&self) -> Arc<PolicySet> {
        match self.cache.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance
    }

    pub fn health(&self) -> &Arc<HealthTracker> {
        &self.health
    }

    pub fn model(&self) -> &ModelDefinition {
        &self.model
    }

    pub fn store(&self) -> &Arc<dyn PolicyStore> {
        &self.store
    }

    /// Re-read every row from the store and swap the cache.
    ///
    /// On failure the previous set keeps serving and the health tracker is
    /// flagged until a later reload succeeds.
    pub async fn reload(&self) -> AuthzResult<()> {
        let _gate = self.write_gate.lock().await;
        self.reload_locked().await
    }

    /// Reload with `write_gate` already held by the caller.
    pub(crate) async fn reload_locked(&self) -> AuthzResult<()> {
        self.health.begin_reload();
        let started = Instant::now();

        let loaded = match tokio::time::timeout(self.reload_timeout, self.store.load()).await {
            Ok(Ok(snapshot)) => Ok(snapshot),
            Ok(Err(err)) => Err(AuthzError::Reload(err.to_string())),
            Err(_) => Err(AuthzError::Reload(format!(
                "store load timed out after {}ms",
                self.reload_timeout.as_millis()
            ))),
        };

        match loaded {
            Ok(snapshot) => {
                let revision = self.revision.fetch_add(1, Ordering::AcqRel) + 1;
                let set = Arc::new(PolicySet::from_snapshot(snapshot, revision));
                let (groupings, permissions) = (set.grouping_count(), set.permission_count());
                self.swap(set);
                self.health.reload_succeeded();
                info!(
                    revision,
                    groupings,
                    permissions,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "policy set reloaded"
                );
                Ok(())
            }
            Err(err) => {
                self.health.reload_failed();
                warn!(
                    error = %err,
                    serving_revision = self.policy_handle().revision(),
                    "policy reload failed; keeping last-known-good set"
                );
                Err(err)
            }
        }
    }

    fn swap(&self, set: Arc<PolicySet>) {
        match self.cache.write() {
            Ok(mut guard) => *guard = set,
            Err(poisoned) => *poisoned.into_inner() = set,
        }
    }

    /// Post-write sequencing: reload locally first, then tell peers.
    ///
    /// Peers are told even when the local reload fails, because the store
    /// already holds the change.
    pub(crate) async fn commit(&self, changed: bool, kind: ChangeKind) -> AuthzResult<()> {
        if !changed {
            return Ok(());
        }
        let reloaded = self.reload_locked().await;
        self.publish(kind).await;
        reloaded
    }

    async fn publish(&self, kind: ChangeKind) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        let event = PolicyChanged::new(self.instance, kind);
        let event_id = event.event_id;
        match notifier.publish(event).await {
            Ok(()) => debug!(%event_id, ?kind, backend = notifier.backend(), "policy change published"),
            Err(err) => warn!(
                error = %err,
                ?kind,
                backend = notifier.backend(),
                "failed to publish policy change; peers converge on their next reload"
            ),
        }
    }

    fn evaluate(
        &self,
        set: &PolicySet,
        subject: &str,
        domain: &Domain,
        resource: &Resource,
        action: &Action,
    ) -> Decision {
        // Read straight from the grouping index rather than through
        // `get_roles_for_user_in_domain`: the bypass must not depend on
        // request-domain validation or the admin surface.
        if self.model.superadmin_bypass
            && set.has_role(subject, self.model.superadmin_role, &Domain::system())
        {
            return Decision::bypass(self.model.superadmin_role);
        }

        let roles = set.roles_for(subject, domain);
        if roles.is_empty() {
            return Decision::evaluated(roles, Vec::new(), Vec::new());
        }
        let first = roles[0];

        let mut allow = Vec::new();
        let mut deny = Vec::new();
        let mut collect = |rule: &PermissionPolicy, held: Role| {
            if matcher::rule_matches(rule, held, domain, resource, action, &self.model) {
                match rule.effect {
                    Effect::Allow => allow.push(rule.clone()),
                    Effect::Deny => deny.push(rule.clone()),
                }
            }
        };

        for &role in &roles {
            for rule in set.permissions_for(role) {
                collect(rule, role);
            }
        }
        // `*` rows apply to whichever role the subject holds; visit them once.
        for rule in set.permissions_for(Role::Any) {
            collect(rule, first);
        }

        Decision::evaluated(roles, allow, deny)
    }
}

pub(crate) struct Request {
    pub(crate) domain: Domain,
    pub(crate) resource: Resource,
    pub(crate) action: Action,
}

impl Request {
    pub(crate) fn parse(subject: &str, domain: &str, resource: &str, action: &str) -> AuthzResult<Self> {
        check_subject(subject)?;
        let domain = Domain::parse(domain)?;
        if domain.is_wildcard() {
            return Err(AuthzError::invalid(format!(
                "request domain must be concrete, got '{domain}'"
            )));
        }
        Ok(Self {
            domain,
            resource: resource.parse()?,
            action: action.parse()?,
        })
    }
}

impl PolicyEnforcer for Enforcer {
    fn enforce_ex(&self, subject: &str, domain: &str, resource: &str, action: &str) -> AuthzResult<Decision> {
        let request = Request::parse(subject, domain, resource, action)?;
        let set = self.policy_handle();
        Ok(self.evaluate(
            &set,
            subject,
            &request.domain,
            &request.resource,
            &request.action,
        ))
    }
}

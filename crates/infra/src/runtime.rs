//! Wiring: turn an [`AuthzConfig`] into a running authorization stack.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use clinicos_authz::{
    Audited, Authorizer, Enforcer, HealthTracker, InMemoryPolicyStore, PolicyStore, seed,
};
use clinicos_events::{ChangeNotifier, InMemoryChangeNotifier};

use crate::config::{AuthzConfig, NotifierBackend};
use crate::notifier::PgChangeNotifier;
use crate::policy_store::PostgresPolicyStore;
use crate::workers::{PolicySyncWorker, SyncHandle};

/// Everything a serving process needs from the authorization layer.
pub struct AuthzRuntime {
    /// The raw engine, for reloads and diagnostics.
    pub enforcer: Arc<Enforcer>,
    /// The engine as callers should use it: audited when enabled.
    pub authorizer: Arc<dyn Authorizer>,
    pub health: Arc<HealthTracker>,
    pub health_check_enabled: bool,
    sync: Option<SyncHandle>,
}

impl std::fmt::Debug for AuthzRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthzRuntime")
            .field("enforcer", &self.enforcer)
            .field("health_check_enabled", &self.health_check_enabled)
            .field("sync", &self.sync.is_some())
            .finish()
    }
}

impl AuthzRuntime {
    pub fn is_syncing(&self) -> bool {
        self.sync.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the sync worker, if one is running.
    pub async fn shutdown(mut self) {
        if let Some(sync) = self.sync.take() {
            sync.shutdown().await;
        }
    }
}

/// Build the store, notifier, and engine described by `config`.
///
/// Every failure here is fatal: a process that cannot load its policy set
/// must not serve.
pub async fn bootstrap(config: &AuthzConfig) -> anyhow::Result<AuthzRuntime> {
    let model = config.model().context("loading authorization model")?;

    let pool = match &config.database_url {
        Some(url) => {
            let store = PostgresPolicyStore::connect(url)
                .await
                .context("connecting to policy database")?;
            store
                .ensure_schema()
                .await
                .context("creating policy tables")?;
            Some(store)
        }
        None => None,
    };

    let store: Arc<dyn PolicyStore> = match &pool {
        Some(pg) => Arc::new(pg.clone()),
        None => Arc::new(InMemoryPolicyStore::new()),
    };

    let notifier: Arc<dyn ChangeNotifier> = match config.notifier {
        NotifierBackend::Memory => Arc::new(InMemoryChangeNotifier::new()),
        NotifierBackend::Postgres => {
            let pg = pool
                .as_ref()
                .context("postgres notifier requires CLINICOS_DATABASE_URL")?;
            Arc::new(PgChangeNotifier::new(
                pg.pool().clone(),
                config.notify_channel.clone(),
            ))
        }
        NotifierBackend::Redis => redis_notifier(config)?,
    };

    let health = HealthTracker::global();
    let enforcer = Arc::new(
        Enforcer::builder(store.clone())
            .notifier(notifier.clone())
            .health(health.clone())
            .model(model)
            .reload_timeout(config.reload_timeout)
            .build()
            .await
            .context("initial policy load")?,
    );

    let sync = if config.enable_policy_sync {
        let handle = PolicySyncWorker::spawn(
            enforcer.clone(),
            notifier.clone(),
            config.resubscribe_backoff,
        )
        .await
        .context("subscribing to policy changes")?;
        Some(handle)
    } else {
        None
    };

    let authorizer: Arc<dyn Authorizer> = if config.enable_audit {
        Arc::new(Audited::new(enforcer.clone()))
    } else {
        enforcer.clone()
    };

    if config.seed_on_boot {
        let report = seed(authorizer.as_ref())
            .await
            .context("seeding baseline policies")?;
        info!(total = report.total, added = report.added, "baseline policies seeded");
    }

    info!(
        store = store.backend(),
        notifier = notifier.backend(),
        audit = config.enable_audit,
        sync = config.enable_policy_sync,
        instance = %enforcer.instance_id(),
        "authorization runtime ready"
    );

    Ok(AuthzRuntime {
        enforcer,
        authorizer,
        health,
        health_check_enabled: config.enable_health_check,
        sync,
    })
}

#[cfg(feature = "redis")]
fn redis_notifier(config: &AuthzConfig) -> anyhow::Result<Arc<dyn ChangeNotifier>> {
    let url = config
        .notifier_url
        .as_deref()
        .context("redis notifier requires CLINICOS_NOTIFIER_URL")?;
    let notifier = crate::notifier::RedisChangeNotifier::new(url, config.notify_channel.clone())
        .context("opening redis client")?;
    Ok(Arc::new(notifier))
}

#[cfg(not(feature = "redis"))]
fn redis_notifier(_config: &AuthzConfig) -> anyhow::Result<Arc<dyn ChangeNotifier>> {
    anyhow::bail!("CLINICOS_NOTIFIER=redis but this build lacks the `redis` feature")
}

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use clinicos_authz::Enforcer;
use clinicos_events::{ChangeNotifier, NotifyError, PolicyChanged, Subscription};

/// Handle to stop and join a running sync worker.
///
/// Dropping the handle without calling [`SyncHandle::shutdown`] also stops
/// the worker, without waiting for it.
#[derive(Debug)]
pub struct SyncHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl SyncHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

/// Keeps one instance's policy cache in step with its peers.
///
/// - Subscribes to the change notifier
/// - Skips events this instance published (already reloaded locally)
/// - Coalesces queued events into a single reload
/// - On a closed subscription: flags health, backs off, resubscribes, and
///   reloads in full, since events may have been missed in between
#[derive(Debug)]
pub struct PolicySyncWorker;

impl PolicySyncWorker {
    /// Subscribe, then spawn the worker task.
    ///
    /// The first subscription is made before returning so a broken notifier
    /// fails startup instead of degrading silently. The enforcer's initial
    /// load predates the subscription, so the cache is reloaded once more
    /// after subscribing to pick up peer writes made in between.
    pub async fn spawn(
        enforcer: Arc<Enforcer>,
        notifier: Arc<dyn ChangeNotifier>,
        resubscribe_backoff: Duration,
    ) -> Result<SyncHandle, NotifyError> {
        let sub = notifier.subscribe().await?;
        // A failure is flagged on the enforcer's health; the next event or
        // resubscribe retries.
        let _ = enforcer.reload().await;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        info!(
            backend = notifier.backend(),
            instance = %enforcer.instance_id().as_uuid(),
            "policy sync worker started"
        );
        let join = tokio::spawn(sync_loop(
            enforcer,
            notifier,
            sub,
            resubscribe_backoff,
            shutdown_rx,
        ));

        Ok(SyncHandle {
            shutdown: Some(shutdown_tx),
            join: Some(join),
        })
    }
}

async fn sync_loop(
    enforcer: Arc<Enforcer>,
    notifier: Arc<dyn ChangeNotifier>,
    mut sub: Subscription<PolicyChanged>,
    backoff: Duration,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        let next = tokio::select! {
            _ = &mut shutdown => break,
            next = sub.recv() => next,
        };

        match next {
            Some(event) => {
                let mut pending = !event.is_from(enforcer.instance_id());
                if !pending {
                    debug!(event_id = %event.event_id, "skipping own policy change");
                }
                while let Ok(queued) = sub.try_recv() {
                    pending |= !queued.is_from(enforcer.instance_id());
                }
                if pending {
                    // Failures are logged and flagged by the enforcer; the
                    // last-known-good set keeps serving.
                    let _ = enforcer.reload().await;
                }
            }
            None => {
                warn!(backend = notifier.backend(), "policy change subscription closed");
                enforcer.health().mark_unhealthy();
                match resubscribe(notifier.as_ref(), backoff, &mut shutdown).await {
                    Some(fresh) => {
                        sub = fresh;
                        let _ = enforcer.reload().await;
                    }
                    None => break,
                }
            }
        }
    }
    info!("policy sync worker stopped");
}

/// Retry subscribing every `backoff` until it works or shutdown is requested.
async fn resubscribe(
    notifier: &dyn ChangeNotifier,
    backoff: Duration,
    shutdown: &mut oneshot::Receiver<()>,
) -> Option<Subscription<PolicyChanged>> {
    loop {
        tokio::select! {
            _ = &mut *shutdown => return None,
            _ = tokio::time::sleep(backoff) => {}
        }
        match notifier.subscribe().await {
            Ok(sub) => {
                info!(backend = notifier.backend(), "policy change subscription re-established");
                return Some(sub);
            }
            Err(err) => warn!(backend = notifier.backend(), error = %err, "resubscribe failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinicos_authz::{HealthTracker, InMemoryPolicyStore, PolicyAdmin, PolicyEnforcer};
    use clinicos_events::InMemoryChangeNotifier;
    use uuid::Uuid;

    struct Cluster {
        store: Arc<InMemoryPolicyStore>,
        notifier: Arc<InMemoryChangeNotifier>,
    }

    impl Cluster {
        fn new() -> Self {
            Self {
                store: Arc::new(InMemoryPolicyStore::new()),
                notifier: Arc::new(InMemoryChangeNotifier::new()),
            }
        }

        async fn instance(&self) -> Arc<Enforcer> {
            Arc::new(
                Enforcer::builder(self.store.clone())
                    .notifier(self.notifier.clone())
                    .health(Arc::new(HealthTracker::new()))
                    .build()
                    .await
                    .unwrap(),
            )
        }
    }

    async fn eventually(mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        check()
    }

    fn project() -> String {
        format!("project:{}", Uuid::now_v7())
    }

    #[tokio::test]
    async fn peer_write_reaches_other_instance() {
        let cluster = Cluster::new();
        let a = cluster.instance().await;
        let b = cluster.instance().await;
        let handle = PolicySyncWorker::spawn(b.clone(), cluster.notifier.clone(), Duration::from_millis(10))
            .await
            .unwrap();

        let p = project();
        a.add_role_for_user_in_domain("alice", "owner", &p).await.unwrap();
        a.add_permission("owner", &p, "chat", "manage", "allow").await.unwrap();

        assert!(eventually(|| b.enforce("alice", &p, "chat", "manage").unwrap()).await);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn writes_between_build_and_spawn_are_not_lost() {
        let cluster = Cluster::new();
        let a = cluster.instance().await;
        let b = cluster.instance().await;

        // b has loaded but is not subscribed yet; this event never reaches it.
        let p = project();
        a.add_role_for_user_in_domain("alice", "owner", &p).await.unwrap();
        a.add_permission("owner", &p, "chat", "read", "allow").await.unwrap();
        assert!(!b.enforce("alice", &p, "chat", "read").unwrap());

        let handle = PolicySyncWorker::spawn(b.clone(), cluster.notifier.clone(), Duration::from_millis(10))
            .await
            .unwrap();
        assert!(b.enforce("alice", &p, "chat", "read").unwrap());
        assert!(b.health().is_healthy());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn own_events_do_not_trigger_reload() {
        let cluster = Cluster::new();
        let a = cluster.instance().await;
        let handle = PolicySyncWorker::spawn(a.clone(), cluster.notifier.clone(), Duration::from_millis(10))
            .await
            .unwrap();

        a.add_role_for_user_in_domain("alice", "owner", &project()).await.unwrap();
        let revision = a.policy_handle().revision();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(a.policy_handle().revision(), revision);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn closed_subscription_recovers_with_full_reload() {
        let cluster = Cluster::new();
        let a = cluster.instance().await;
        let b = cluster.instance().await;
        let handle = PolicySyncWorker::spawn(b.clone(), cluster.notifier.clone(), Duration::from_millis(20))
            .await
            .unwrap();

        // Written while b is cut off: no event will ever reach it.
        cluster.notifier.disconnect_all();
        let p = project();
        a.add_role_for_user_in_domain("late", "member", &p).await.unwrap();

        assert!(
            eventually(|| b.get_roles_for_user_in_domain("late", &p).unwrap().len() == 1).await
        );
        assert!(eventually(|| b.health().is_healthy()).await);
        assert!(!handle.is_finished());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn failed_peer_reload_keeps_serving_and_flags_health() {
        let cluster = Cluster::new();
        let a = cluster.instance().await;
        let b = cluster.instance().await;
        let p = project();
        a.add_role_for_user_in_domain("alice", "owner", &p).await.unwrap();
        a.add_permission("owner", &p, "chat", "read", "allow").await.unwrap();
        b.reload().await.unwrap();

        let handle = PolicySyncWorker::spawn(b.clone(), cluster.notifier.clone(), Duration::from_millis(10))
            .await
            .unwrap();

        // a writes, then the store goes away before b can reload.
        let store = cluster.store.clone();
        let notifier = cluster.notifier.clone();
        store.set_unavailable(true);
        notifier
            .publish(PolicyChanged::new(a.instance_id(), clinicos_events::ChangeKind::Bulk))
            .await
            .unwrap();

        assert!(eventually(|| !b.health().is_healthy()).await);
        assert!(b.enforce("alice", &p, "chat", "read").unwrap());

        store.set_unavailable(false);
        notifier
            .publish(PolicyChanged::new(a.instance_id(), clinicos_events::ChangeKind::Bulk))
            .await
            .unwrap();
        assert!(eventually(|| b.health().is_healthy()).await);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_stops_worker() {
        let cluster = Cluster::new();
        let a = cluster.instance().await;
        let handle = PolicySyncWorker::spawn(a, cluster.notifier.clone(), Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle.shutdown())
            .await
            .unwrap();
    }
}

//! Integration tests for the multi-instance pipeline.
//!
//! Tests: Admin write → PolicyStore → ChangeNotifier → PolicySyncWorker → peer cache
//!
//! Verifies:
//! - Every instance converges on the stored policy set
//! - Domain isolation holds across instances
//! - Deny rows written on one instance bite on the others

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use uuid::Uuid;

    use clinicos_authz::{
        Audited, Enforcer, HealthTracker, InMemoryPolicyStore, PolicyAdmin, PolicyEnforcer, seed,
    };
    use clinicos_events::InMemoryChangeNotifier;

    use crate::workers::{PolicySyncWorker, SyncHandle};

    struct Node {
        enforcer: Arc<Enforcer>,
        sync: SyncHandle,
    }

    async fn cluster(size: usize) -> Vec<Node> {
        let store = Arc::new(InMemoryPolicyStore::new());
        let notifier = Arc::new(InMemoryChangeNotifier::new());
        let mut nodes = Vec::with_capacity(size);
        for _ in 0..size {
            let enforcer = Arc::new(
                Enforcer::builder(store.clone())
                    .notifier(notifier.clone())
                    .health(Arc::new(HealthTracker::new()))
                    .build()
                    .await
                    .unwrap(),
            );
            let sync = PolicySyncWorker::spawn(enforcer.clone(), notifier.clone(), Duration::from_millis(10))
                .await
                .unwrap();
            nodes.push(Node { enforcer, sync });
        }
        nodes
    }

    async fn shutdown(nodes: Vec<Node>) {
        for node in nodes {
            node.sync.shutdown().await;
        }
    }

    /// Poll until every node agrees with `expected`, or give up after ~2s.
    async fn converges(nodes: &[Node], sub: &str, dom: &str, obj: &str, act: &str, expected: bool) -> bool {
        for _ in 0..200 {
            if nodes
                .iter()
                .all(|n| n.enforcer.enforce(sub, dom, obj, act).unwrap() == expected)
            {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    fn clinic() -> String {
        format!("clinic:{}", Uuid::now_v7())
    }

    #[tokio::test]
    async fn seed_on_one_node_reaches_all() {
        let nodes = cluster(3).await;
        let c = clinic();

        let report = seed(&Audited::new(nodes[0].enforcer.clone())).await.unwrap();
        assert_eq!(report.added, report.total);
        nodes[1]
            .enforcer
            .add_role_for_user_in_domain("nurse-kim", "nurse", &c)
            .await
            .unwrap();

        assert!(converges(&nodes, "nurse-kim", &c, "patient/7", "read", true).await);
        shutdown(nodes).await;
    }

    #[tokio::test]
    async fn deny_written_on_one_node_overrides_everywhere() {
        let nodes = cluster(3).await;
        let c = clinic();

        nodes[0].enforcer.add_role_for_user_in_domain("bob", "receptionist", &c).await.unwrap();
        nodes[0].enforcer.add_permission("receptionist", &c, "invoice", "*", "allow").await.unwrap();
        assert!(converges(&nodes, "bob", &c, "invoice", "delete", true).await);

        nodes[2].enforcer.add_permission("receptionist", &c, "invoice", "delete", "deny").await.unwrap();
        assert!(converges(&nodes, "bob", &c, "invoice", "delete", false).await);
        assert!(converges(&nodes, "bob", &c, "invoice", "read", true).await);
        shutdown(nodes).await;
    }

    #[tokio::test]
    async fn grants_stay_inside_their_clinic_on_every_node() {
        let nodes = cluster(2).await;
        let (a, b) = (clinic(), clinic());

        nodes[0].enforcer.add_role_for_user_in_domain("eve", "owner", &a).await.unwrap();
        nodes[0].enforcer.add_permission("owner", &a, "*", "*", "allow").await.unwrap();

        assert!(converges(&nodes, "eve", &a, "patient", "delete", true).await);
        assert!(converges(&nodes, "eve", &b, "patient", "delete", false).await);
        shutdown(nodes).await;
    }

    #[tokio::test]
    async fn removing_a_subject_revokes_on_peers() {
        let nodes = cluster(2).await;
        let c = clinic();

        nodes[0].enforcer.add_role_for_user_in_domain("leaver", "owner", &c).await.unwrap();
        nodes[0].enforcer.add_permission("owner", &c, "*", "*", "allow").await.unwrap();
        assert!(converges(&nodes, "leaver", &c, "chat", "read", true).await);

        assert_eq!(nodes[1].enforcer.remove_subject("leaver").await.unwrap(), 1);
        assert!(converges(&nodes, "leaver", &c, "chat", "read", false).await);
        shutdown(nodes).await;
    }
}

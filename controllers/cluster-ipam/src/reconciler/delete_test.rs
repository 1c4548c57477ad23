//! Unit tests for finalizer-gated deletion

#[cfg(test)]
mod tests {
    use crate::reconcile_helpers::has_finalizer;
    use crate::reconciler::{ClusterPhase, Outcome};
    use crate::test_utils::*;
    use ipam_client::{MockIpamClient, MockOperation};

    #[tokio::test]
    async fn test_deletion_waits_for_parent() {
        let ipam = MockIpamClient::new();
        let store = MockClusterStore::with_parent("default", "test");
        let reconciler = create_test_reconciler(ipam.clone(), store.clone());
        let mut cluster = converge(&reconciler, &ipam, &store, &create_test_vm_cluster("test", "default"), "10.0.0.2").await;
        mark_deleting(&mut cluster);
        assert_eq!(ClusterPhase::of(&cluster), ClusterPhase::Deleting);

        // Parent still present: its deletion is requested, nothing else
        let outcome = reconciler.reconcile_vm_cluster(&cluster).await.unwrap();
        assert_eq!(outcome, Outcome::RequeueAfter(TEST_REQUEUE));
        assert_eq!(store.parent_delete_requests(), vec!["default/test".to_string()]);
        assert_eq!(ipam.call_count("delete_"), 0);
        assert!(has_finalizer(&store.refresh(&cluster)));

        // Parent terminating: no repeated request, still nothing deleted
        reconciler.reconcile_vm_cluster(&store.refresh(&cluster)).await.unwrap();
        assert_eq!(store.parent_delete_requests().len(), 1);
        assert_eq!(ipam.call_count("delete_"), 0);
        assert_eq!(ipam.pool_count(), 1);
        assert_eq!(ipam.claim_count(), 1);

        // Parent gone: dependents deleted, finalizer kept until they disappear
        store.remove_parent("default", "test");
        ipam.hold_deletes(true);
        let outcome = reconciler.reconcile_vm_cluster(&store.refresh(&cluster)).await.unwrap();
        assert_eq!(outcome, Outcome::RequeueAfter(TEST_REQUEUE));
        assert!(has_finalizer(&store.refresh(&cluster)), "Finalizer kept while dependents terminate");

        let calls = ipam.calls();
        let claim_delete = calls.iter().position(|c| c == "delete_claim:test").unwrap();
        let pool_delete = calls.iter().position(|c| c == "delete_pool:test-v4-icip").unwrap();
        assert!(claim_delete < pool_delete, "Claims are deleted before pools");

        // Still terminating on the next pass
        reconciler.reconcile_vm_cluster(&store.refresh(&cluster)).await.unwrap();
        assert!(has_finalizer(&store.refresh(&cluster)));

        // Dependents gone: finalizer released
        ipam.hold_deletes(false);
        let outcome = reconciler.reconcile_vm_cluster(&store.refresh(&cluster)).await.unwrap();
        assert_eq!(outcome, Outcome::Done);
        assert!(!has_finalizer(&store.refresh(&cluster)));
        assert_eq!(ipam.pool_count(), 0);
        assert_eq!(ipam.claim_count(), 0);
    }

    #[tokio::test]
    async fn test_deletion_without_parent_releases_in_two_passes() {
        let ipam = MockIpamClient::new();
        let store = MockClusterStore::with_parent("default", "test");
        let reconciler = create_test_reconciler(ipam.clone(), store.clone());
        let mut cluster =
            converge(&reconciler, &ipam, &store, &create_dual_stack_vm_cluster("test", "default"), "10.0.0.2").await;
        store.remove_parent("default", "test");
        mark_deleting(&mut cluster);

        assert_eq!(reconciler.reconcile_vm_cluster(&cluster).await.unwrap(), Outcome::RequeueAfter(TEST_REQUEUE));
        assert_eq!(ipam.call_count("delete_pool"), 2);
        assert!(has_finalizer(&store.refresh(&cluster)), "Removal is confirmed on the next pass");

        assert_eq!(reconciler.reconcile_vm_cluster(&store.refresh(&cluster)).await.unwrap(), Outcome::Done);
        assert!(!has_finalizer(&store.refresh(&cluster)));
    }

    #[tokio::test]
    async fn test_deletion_proceeds_while_paused() {
        let ipam = MockIpamClient::new();
        let store = MockClusterStore::with_parent("default", "test");
        let reconciler = create_test_reconciler(ipam.clone(), store.clone());
        let mut cluster = converge(&reconciler, &ipam, &store, &create_test_vm_cluster("test", "default"), "10.0.0.2").await;
        store.remove_parent("default", "test");
        cluster.spec.paused = true;
        mark_deleting(&mut cluster);

        reconciler.reconcile_vm_cluster(&cluster).await.unwrap();
        reconciler.reconcile_vm_cluster(&store.refresh(&cluster)).await.unwrap();

        assert!(!has_finalizer(&store.refresh(&cluster)));
    }

    #[tokio::test]
    async fn test_deletion_without_finalizer_is_noop() {
        let ipam = MockIpamClient::new();
        let store = MockClusterStore::with_parent("default", "test");
        let reconciler = create_test_reconciler(ipam.clone(), store.clone());
        let mut cluster = create_test_vm_cluster("test", "default");
        mark_deleting(&mut cluster);

        assert_eq!(reconciler.reconcile_vm_cluster(&cluster).await.unwrap(), Outcome::Done);
        assert!(ipam.calls().is_empty());
        assert!(store.parent_delete_requests().is_empty());
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_finalizer() {
        let ipam = MockIpamClient::new();
        let store = MockClusterStore::with_parent("default", "test");
        let reconciler = create_test_reconciler(ipam.clone(), store.clone());
        let mut cluster = converge(&reconciler, &ipam, &store, &create_test_vm_cluster("test", "default"), "10.0.0.2").await;
        store.remove_parent("default", "test");
        mark_deleting(&mut cluster);
        ipam.fail_next(MockOperation::DeleteClaim, "provider unavailable");

        let err = reconciler.reconcile_vm_cluster(&cluster).await.unwrap_err();
        assert!(!err.is_permanent());
        assert_eq!(ipam.call_count("delete_pool"), 0, "Pools wait for claims");
        assert!(has_finalizer(&store.refresh(&cluster)));

        reconciler.reconcile_vm_cluster(&store.refresh(&cluster)).await.unwrap();
        reconciler.reconcile_vm_cluster(&store.refresh(&cluster)).await.unwrap();
        assert!(!has_finalizer(&store.refresh(&cluster)));
        let text = reconciler.metrics.render().unwrap();
        assert!(text.contains("vmcluster_ipam_finalizers_removed_total 1"));
    }
}

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `gc.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::backend::BackendClient;
    use crate::binding_errors::BackendError;
    use crate::crd::{SubnetConnectionBindingMap, SubnetConnectionBindingMapStatus};
    use crate::requests::BindingRequestClient;
    use crate::service::BindingService;
    use crate::store::BindingStore;
    use crate::test_support::{
        binding_request, owned_binding, FakeBackend, FakeRequests, FakeResolver, TEST_CLUSTER,
    };
    use std::collections::HashSet;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    struct Harness {
        backend: Arc<FakeBackend>,
        requests: Arc<FakeRequests>,
        ctx: Context,
    }

    /// Store and backend hold bindings of `live` (uid-1) and `gone` (uid-2, uid-3).
    fn harness() -> Harness {
        let backend = Arc::new(FakeBackend::new());
        let bindings = [
            owned_binding("live-a", "c1", "p1", "ns1", "live", "uid-1"),
            owned_binding("gone-a", "c2", "p1", "ns1", "gone", "uid-2"),
            owned_binding("gone-b", "c2", "p2", "ns1", "gone", "uid-2"),
            owned_binding("other-a", "c3", "p3", "ns2", "other", "uid-3"),
        ];
        backend.seed(&bindings);

        let store = Arc::new(BindingStore::new());
        store.apply_many(&bindings);

        let requests = Arc::new(
            FakeRequests::new().with_request(binding_request(
                "ns1",
                "live",
                "uid-1",
                "c1",
                Some("p1"),
                None,
            )),
        );
        let service = Arc::new(BindingService::new(
            store,
            backend.clone() as Arc<dyn BackendClient>,
            TEST_CLUSTER,
            10,
        ));
        let ctx = Context::new(
            requests.clone(),
            Arc::new(FakeResolver::new()),
            service,
            CancellationToken::new(),
        );
        Harness {
            backend,
            requests,
            ctx,
        }
    }

    #[tokio::test]
    async fn test_collects_bindings_of_deleted_owners() {
        let h = harness();

        let report = collect(&h.ctx).await.unwrap();

        assert_eq!(report.deleted, 3);
        let uids: Vec<&str> = report.orphaned_owners.iter().map(|o| o.uid.as_str()).collect();
        assert_eq!(uids, vec!["uid-2", "uid-3"]);

        let store = h.ctx.service.store();
        assert_eq!(store.len(), 1);
        assert!(store.get_by_key("live-a").is_some());

        let remaining: Vec<String> = h.backend.objects().into_iter().map(|b| b.id).collect();
        assert_eq!(remaining, vec!["live-a".to_string()]);
    }

    #[tokio::test]
    async fn test_listing_failure_deletes_nothing() {
        let h = harness();
        h.requests.fail_listing();

        let err = collect(&h.ctx).await.unwrap_err();

        assert!(matches!(err, ReconcileError::LiveListing(_)));
        assert_eq!(h.backend.write_count(), 0);
        assert_eq!(h.ctx.service.store().len(), 4);
        assert_eq!(h.backend.objects().len(), 4);
    }

    #[tokio::test]
    async fn test_nothing_orphaned_skips_backend() {
        let h = harness();
        h.requests
            .insert(binding_request("ns1", "gone", "uid-2", "c2", Some("p1"), None));
        h.requests
            .insert(binding_request("ns2", "other", "uid-3", "c3", Some("p3"), None));

        let report = collect(&h.ctx).await.unwrap();

        assert_eq!(report, GcReport::default());
        assert_eq!(h.backend.write_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_store() {
        let h = harness();
        h.backend.fail_write_on(
            0,
            BackendError::Transport {
                url: "https://backend/policy/api/v1/org-root".to_string(),
                reason: "connection reset".to_string(),
            },
        );

        let err = collect(&h.ctx).await.unwrap_err();

        assert!(matches!(err, ReconcileError::BackendWrite(_)));
        assert_eq!(h.ctx.service.store().len(), 4);
    }

    #[tokio::test]
    async fn test_untagged_bindings_are_never_collected() {
        let h = harness();
        let mut untagged = owned_binding("manual", "c9", "p9", "ns1", "x", "uid-x");
        untagged.tags.truncate(1);
        h.ctx.service.store().apply(&untagged);
        h.requests
            .insert(binding_request("ns1", "gone", "uid-2", "c2", Some("p1"), None));
        h.requests
            .insert(binding_request("ns2", "other", "uid-3", "c3", Some("p3"), None));

        let report = collect(&h.ctx).await.unwrap();

        assert_eq!(report.deleted, 0);
        assert!(h.ctx.service.store().get_by_key("manual").is_some());
    }

    /// Commits a new request and its binding right after taking the live snapshot.
    struct RacingRequests {
        inner: Arc<FakeRequests>,
        store: Arc<BindingStore>,
        backend: Arc<FakeBackend>,
    }

    #[async_trait::async_trait]
    impl BindingRequestClient for RacingRequests {
        async fn get(
            &self,
            namespace: &str,
            name: &str,
        ) -> anyhow::Result<Option<SubnetConnectionBindingMap>> {
            self.inner.get(namespace, name).await
        }

        async fn list_live_uids(&self) -> anyhow::Result<HashSet<String>> {
            let live = self.inner.list_live_uids().await?;
            self.inner
                .insert(binding_request("ns1", "fresh", "uid-new", "c4", Some("p4"), None));
            let fresh = owned_binding("fresh-a", "c4", "p4", "ns1", "fresh", "uid-new");
            self.backend.seed(std::slice::from_ref(&fresh));
            self.store.apply(&fresh);
            Ok(live)
        }

        async fn patch_status(
            &self,
            namespace: &str,
            name: &str,
            status: &SubnetConnectionBindingMapStatus,
        ) -> anyhow::Result<()> {
            self.inner.patch_status(namespace, name, status).await
        }

        async fn ensure_finalizer(&self, request: &SubnetConnectionBindingMap) -> anyhow::Result<()> {
            self.inner.ensure_finalizer(request).await
        }

        async fn remove_finalizer(&self, request: &SubnetConnectionBindingMap) -> anyhow::Result<()> {
            self.inner.remove_finalizer(request).await
        }
    }

    #[tokio::test]
    async fn test_request_created_during_pass_is_kept() {
        let backend = Arc::new(FakeBackend::new());
        let gone = owned_binding("gone-a", "c2", "p1", "ns1", "gone", "uid-2");
        backend.seed(std::slice::from_ref(&gone));
        let store = Arc::new(BindingStore::new());
        store.apply(&gone);

        let requests = Arc::new(RacingRequests {
            inner: Arc::new(FakeRequests::new()),
            store: store.clone(),
            backend: backend.clone(),
        });
        let service = Arc::new(BindingService::new(
            store.clone(),
            backend.clone() as Arc<dyn BackendClient>,
            TEST_CLUSTER,
            10,
        ));
        let ctx = Context::new(
            requests,
            Arc::new(FakeResolver::new()),
            service,
            CancellationToken::new(),
        );

        let report = collect(&ctx).await.unwrap();

        let uids: Vec<&str> = report.orphaned_owners.iter().map(|o| o.uid.as_str()).collect();
        assert_eq!(uids, vec!["uid-2"]);
        assert_eq!(report.deleted, 1);
        assert!(store.get_by_key("fresh-a").is_some());
        assert!(store.get_by_key("gone-a").is_none());

        let remaining: Vec<String> = backend.objects().into_iter().map(|b| b.id).collect();
        assert_eq!(remaining, vec!["fresh-a".to_string()]);
    }
}

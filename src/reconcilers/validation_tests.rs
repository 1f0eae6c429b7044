// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `validation.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::binding_errors::DependencyErrorKind;
    use crate::test_support::{
        associated_subnet, binding_request, owned_binding, realized_subnet, subnet_path,
        subnet_set, unrealized_subnet, FakeResolver,
    };

    const NS: &str = "ns1";

    fn resolver() -> FakeResolver {
        FakeResolver::new()
            .with_subnet(realized_subnet(NS, "child"))
            .with_subnet(realized_subnet(NS, "parent"))
    }

    async fn kind_of(
        request: &SubnetConnectionBindingMap,
        resolver: &FakeResolver,
        store: &BindingStore,
    ) -> DependencyErrorKind {
        validate(request, resolver, store).await.unwrap_err().kind
    }

    #[tokio::test]
    async fn test_valid_single_target() {
        let request = binding_request(NS, "b1", "uid-1", "child", Some("parent"), None);

        let resolved = validate(&request, &resolver(), &BindingStore::new()).await.unwrap();

        assert_eq!(resolved.child_subnet_path, subnet_path("child"));
        assert_eq!(resolved.target_subnet_paths, vec![subnet_path("parent")]);
    }

    #[tokio::test]
    async fn test_valid_subnet_set_target() {
        let resolver = resolver().with_subnet_set(subnet_set(NS, "set", &["p1", "p2"]));
        let request = binding_request(NS, "b1", "uid-1", "child", None, Some("set"));

        let resolved = validate(&request, &resolver, &BindingStore::new()).await.unwrap();

        assert_eq!(resolved.target_subnet_paths, vec![subnet_path("p1"), subnet_path("p2")]);
    }

    #[tokio::test]
    async fn test_both_or_neither_target_is_invalid_spec() {
        let store = BindingStore::new();
        let both = binding_request(NS, "b1", "uid-1", "child", Some("parent"), Some("set"));
        let neither = binding_request(NS, "b1", "uid-1", "child", None, None);

        assert_eq!(kind_of(&both, &resolver(), &store).await, DependencyErrorKind::InvalidSpec);
        assert_eq!(kind_of(&neither, &resolver(), &store).await, DependencyErrorKind::InvalidSpec);
    }

    #[tokio::test]
    async fn test_missing_child_is_permanent() {
        let request = binding_request(NS, "b1", "uid-1", "nope", Some("parent"), None);

        let err = validate(&request, &resolver(), &BindingStore::new()).await.unwrap_err();

        assert_eq!(err.kind, DependencyErrorKind::ResourceNotFound);
        assert!(!err.is_retryable());
        assert_eq!(err.reason(), "DependencyNotReady");
    }

    #[tokio::test]
    async fn test_lookup_failure_is_permanent_not_found() {
        let resolver = resolver();
        resolver.fail_lookups();
        let request = binding_request(NS, "b1", "uid-1", "child", Some("parent"), None);

        let err = validate(&request, &resolver, &BindingStore::new()).await.unwrap_err();

        assert_eq!(err.kind, DependencyErrorKind::ResourceNotFound);
        assert_eq!(err.message, "Unable to get Subnet CR child");
        assert!(err.detail.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_unrealized_child_is_permanent() {
        let resolver = resolver();
        resolver.insert_subnet(unrealized_subnet(NS, "child"));
        let request = binding_request(NS, "b1", "uid-1", "child", Some("parent"), None);

        let err = validate(&request, &resolver, &BindingStore::new()).await.unwrap_err();

        assert_eq!(err.kind, DependencyErrorKind::DependencyUnready);
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_unready_associated_child_is_unrealized() {
        let resolver = resolver();
        resolver.insert_subnet(associated_subnet(NS, "child", "proj1:vpc1:child", false));
        let request = binding_request(NS, "b1", "uid-1", "child", Some("parent"), None);

        assert_eq!(
            kind_of(&request, &resolver, &BindingStore::new()).await,
            DependencyErrorKind::DependencyUnready
        );
    }

    #[tokio::test]
    async fn test_empty_subnet_set_is_permanent() {
        let resolver = resolver().with_subnet_set(subnet_set(NS, "set", &[]));
        let request = binding_request(NS, "b1", "uid-1", "child", None, Some("set"));

        assert_eq!(
            kind_of(&request, &resolver, &BindingStore::new()).await,
            DependencyErrorKind::DependencyUnready
        );
    }

    #[tokio::test]
    async fn test_missing_subnet_set_is_permanent() {
        let request = binding_request(NS, "b1", "uid-1", "child", None, Some("set"));

        assert_eq!(
            kind_of(&request, &resolver(), &BindingStore::new()).await,
            DependencyErrorKind::ResourceNotFound
        );
    }

    #[tokio::test]
    async fn test_pre_provisioned_target_rejected() {
        let resolver = resolver();
        resolver.insert_subnet(associated_subnet(NS, "parent", "proj1:vpc1:parent", true));
        let request = binding_request(NS, "b1", "uid-1", "child", Some("parent"), None);

        let err = validate(&request, &resolver, &BindingStore::new()).await.unwrap_err();

        assert_eq!(err.kind, DependencyErrorKind::PreProvisionedTargetRejected);
        assert_eq!(err.reason(), "UnsupportedTarget");
    }

    #[tokio::test]
    async fn test_child_already_a_target_is_retryable_and_names_owner() {
        let store = BindingStore::new();
        store.apply(&owned_binding("x", "other", "child", "ns2", "first", "uid-9"));
        let request = binding_request(NS, "b1", "uid-1", "child", Some("parent"), None);

        let err = validate(&request, &resolver(), &store).await.unwrap_err();

        assert_eq!(err.kind, DependencyErrorKind::NestedBindingConflict);
        assert!(err.is_retryable());
        assert!(err.message.contains("ns2/first"));
    }

    #[tokio::test]
    async fn test_target_already_a_child_is_retryable() {
        let store = BindingStore::new();
        store.apply(&owned_binding("x", "parent", "elsewhere", "ns2", "first", "uid-9"));
        let request = binding_request(NS, "b1", "uid-1", "child", Some("parent"), None);

        let err = validate(&request, &resolver(), &store).await.unwrap_err();

        assert_eq!(err.kind, DependencyErrorKind::NestedBindingConflict);
        assert!(err.message.contains("ns2/first"));
    }

    #[tokio::test]
    async fn test_own_bindings_do_not_conflict() {
        let store = BindingStore::new();
        store.apply(&owned_binding("x", "child", "parent", NS, "b1", "uid-1"));
        let request = binding_request(NS, "b1", "uid-1", "child", Some("parent"), None);

        assert!(validate(&request, &resolver(), &store).await.is_ok());
    }

    #[tokio::test]
    async fn test_pre_provisioned_child_in_same_vpc_is_valid() {
        let resolver = resolver();
        resolver.insert_subnet(associated_subnet(NS, "child", "proj1:vpc1:child", true));
        let request = binding_request(NS, "b1", "uid-1", "child", Some("parent"), None);

        let resolved = validate(&request, &resolver, &BindingStore::new()).await.unwrap();
        assert_eq!(resolved.child_subnet_path, subnet_path("child"));
    }

    #[tokio::test]
    async fn test_pre_provisioned_child_in_other_vpc_is_permanent() {
        let resolver = resolver();
        resolver.insert_subnet(associated_subnet(NS, "child", "proj1:vpc2:child", true));
        let request = binding_request(NS, "b1", "uid-1", "child", Some("parent"), None);

        let err = validate(&request, &resolver, &BindingStore::new()).await.unwrap_err();

        assert_eq!(err.kind, DependencyErrorKind::CrossDomainMismatch);
        assert_eq!(err.reason(), "VpcMismatch");
        assert!(!err.is_retryable());
    }
}

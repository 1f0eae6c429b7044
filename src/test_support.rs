// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory fakes and fixtures shared by unit tests.

use crate::backend::{BackendBinding, BackendClient, SubnetPath, Tag};
use crate::binding_errors::BackendError;
use crate::constants::{
    ASSOCIATED_RESOURCE_ANNOTATION, TAG_SCOPE_CLUSTER, TAG_SCOPE_NAMESPACE, TAG_SCOPE_OWNER_NAME,
    TAG_SCOPE_OWNER_UID,
};
use crate::crd::{
    Condition, Subnet, SubnetConnectionBindingMap, SubnetConnectionBindingMapSpec,
    SubnetConnectionBindingMapStatus, SubnetInfo, SubnetSet, SubnetSetSpec, SubnetSetStatus,
    SubnetSpec, SubnetStatus,
};
use crate::hierarchy::{flatten_tree, TreeNode};
use crate::requests::BindingRequestClient;
use crate::resolver::SubnetResolver;
use anyhow::{anyhow, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

pub const TEST_CLUSTER: &str = "cluster1";

pub fn subnet_path(subnet: &str) -> String {
    format!("/orgs/default/projects/proj1/vpcs/vpc1/subnets/{subnet}")
}

/// A binding under `/orgs/{org}/projects/{project}/vpcs/{vpc}/subnets/{subnet}`.
pub fn backend_binding(id: &str, org: &str, project: &str, vpc: &str, subnet: &str) -> BackendBinding {
    let child = format!("/orgs/{org}/projects/{project}/vpcs/{vpc}/subnets/{subnet}");
    BackendBinding {
        id: id.to_string(),
        display_name: id.to_string(),
        resource_type: "SubnetConnectionBindingMap".to_string(),
        vlan_traffic_tag: 100,
        target_subnet_path: format!("/orgs/{org}/projects/{project}/vpcs/{vpc}/subnets/parent"),
        child_subnet_path: child,
        tags: Vec::new(),
        marked_for_delete: false,
        path: None,
        revision: None,
    }
}

/// A binding owned by `namespace/name` (uid) from `child` to `target`.
pub fn owned_binding(
    id: &str,
    child: &str,
    target: &str,
    namespace: &str,
    name: &str,
    uid: &str,
) -> BackendBinding {
    BackendBinding {
        id: id.to_string(),
        display_name: name.to_string(),
        resource_type: "SubnetConnectionBindingMap".to_string(),
        vlan_traffic_tag: 100,
        target_subnet_path: subnet_path(target),
        child_subnet_path: subnet_path(child),
        tags: vec![
            Tag::new(TAG_SCOPE_CLUSTER, TEST_CLUSTER),
            Tag::new(TAG_SCOPE_NAMESPACE, namespace),
            Tag::new(TAG_SCOPE_OWNER_NAME, name),
            Tag::new(TAG_SCOPE_OWNER_UID, uid),
        ],
        marked_for_delete: false,
        path: None,
        revision: None,
    }
}

pub fn binding_request(
    namespace: &str,
    name: &str,
    uid: &str,
    child: &str,
    target: Option<&str>,
    target_set: Option<&str>,
) -> SubnetConnectionBindingMap {
    let mut request = SubnetConnectionBindingMap::new(
        name,
        SubnetConnectionBindingMapSpec {
            subnet_name: child.to_string(),
            target_subnet_name: target.map(str::to_string),
            target_subnet_set_name: target_set.map(str::to_string),
            vlan_traffic_tag: 101,
        },
    );
    request.metadata.namespace = Some(namespace.to_string());
    request.metadata.uid = Some(uid.to_string());
    request
}

fn ready(status: bool) -> Condition {
    Condition {
        r#type: "Ready".to_string(),
        status: if status { "True" } else { "False" }.to_string(),
        reason: None,
        message: None,
        last_transition_time: None,
    }
}

fn subnet_meta(namespace: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        ..Default::default()
    }
}

/// A subnet realized at [`subnet_path`]`(name)`.
pub fn realized_subnet(namespace: &str, name: &str) -> Subnet {
    Subnet {
        metadata: subnet_meta(namespace, name),
        spec: SubnetSpec::default(),
        status: Some(SubnetStatus {
            conditions: vec![ready(true)],
            backend_path: Some(subnet_path(name)),
            network_addresses: Vec::new(),
        }),
    }
}

pub fn unrealized_subnet(namespace: &str, name: &str) -> Subnet {
    Subnet {
        metadata: subnet_meta(namespace, name),
        spec: SubnetSpec::default(),
        status: Some(SubnetStatus::default()),
    }
}

/// A pre-provisioned subnet adopted through the associated-resource annotation.
pub fn associated_subnet(namespace: &str, name: &str, annotation: &str, is_ready: bool) -> Subnet {
    let mut metadata = subnet_meta(namespace, name);
    metadata.annotations = Some(BTreeMap::from([(
        ASSOCIATED_RESOURCE_ANNOTATION.to_string(),
        annotation.to_string(),
    )]));
    Subnet {
        metadata,
        spec: SubnetSpec::default(),
        status: Some(SubnetStatus {
            conditions: vec![ready(is_ready)],
            backend_path: None,
            network_addresses: Vec::new(),
        }),
    }
}

/// A subnet set whose realized members are [`subnet_path`] of each name.
pub fn subnet_set(namespace: &str, name: &str, members: &[&str]) -> SubnetSet {
    SubnetSet {
        metadata: subnet_meta(namespace, name),
        spec: SubnetSetSpec::default(),
        status: Some(SubnetSetStatus {
            conditions: Vec::new(),
            subnets: members
                .iter()
                .map(|m| SubnetInfo {
                    backend_path: subnet_path(m),
                    network_addresses: Vec::new(),
                })
                .collect(),
        }),
    }
}

/// Backend fake recording every bulk write and serving lists from the
/// bindings it holds.
#[derive(Default)]
pub struct FakeBackend {
    writes: Mutex<Vec<TreeNode>>,
    calls: Mutex<usize>,
    fail_on: Mutex<Option<(usize, BackendError)>>,
    list_error: Mutex<Option<BackendError>>,
    objects: Mutex<BTreeMap<String, BackendBinding>>,
    enforce_revisions: Mutex<bool>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stale_revision() -> BackendError {
        BackendError::Request {
            method: "PATCH".to_string(),
            url: "http://backend/policy/api/v1/org-root".to_string(),
            status: 412,
            error_code: None,
            message: "stale revision".to_string(),
        }
    }

    /// Fail the bulk-write call with zero-based index `call`.
    pub fn fail_write_on(&self, call: usize, error: BackendError) {
        *self.fail_on.lock().unwrap() = Some((call, error));
    }

    pub fn fail_lists(&self, error: BackendError) {
        *self.list_error.lock().unwrap() = Some(error);
    }

    pub fn restore_lists(&self) {
        *self.list_error.lock().unwrap() = None;
    }

    /// Reject writes whose revision differs from the stored one with a 412.
    pub fn enforce_revisions(&self) {
        *self.enforce_revisions.lock().unwrap() = true;
    }

    /// Bump the stored revision as if another writer had updated the binding.
    pub fn touch(&self, id: &str) {
        if let Some(binding) = self.objects.lock().unwrap().get_mut(id) {
            binding.revision = Some(binding.revision.map_or(0, |r| r + 1));
        }
    }

    pub fn seed(&self, bindings: &[BackendBinding]) {
        let mut objects = self.objects.lock().unwrap();
        for b in bindings {
            objects.insert(b.id.clone(), b.clone());
        }
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    pub fn written(&self) -> Vec<TreeNode> {
        self.writes.lock().unwrap().clone()
    }

    /// Bindings currently held by the fake backend.
    pub fn objects(&self) -> Vec<BackendBinding> {
        self.objects.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait::async_trait]
impl BackendClient for FakeBackend {
    async fn bulk_write(&self, tree: &TreeNode) -> Result<(), BackendError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let call = *calls;
            *calls += 1;
            call
        };
        if let Some((fail_call, error)) = self.fail_on.lock().unwrap().as_ref() {
            if *fail_call == call {
                return Err(error.clone());
            }
        }

        let mut objects = self.objects.lock().unwrap();
        if *self.enforce_revisions.lock().unwrap() {
            let stale = flatten_tree(tree).iter().any(|binding| {
                !binding.marked_for_delete
                    && objects
                        .get(&binding.id)
                        .is_some_and(|held| held.revision != binding.revision)
            });
            if stale {
                return Err(Self::stale_revision());
            }
        }
        for binding in flatten_tree(tree) {
            if binding.marked_for_delete {
                objects.remove(&binding.id);
            } else {
                let mut stored = binding.clone();
                stored.path = Some(binding.hierarchy_path());
                stored.revision = Some(stored.revision.map_or(0, |r| r + 1));
                objects.insert(binding.id.clone(), stored);
            }
        }
        self.writes.lock().unwrap().push(tree.clone());
        Ok(())
    }

    async fn list_by_path(
        &self,
        org: &str,
        project: &str,
        vpc: &str,
        subnet: &str,
    ) -> Result<Vec<BackendBinding>, BackendError> {
        if let Some(error) = self.list_error.lock().unwrap().clone() {
            return Err(error);
        }
        let wanted = SubnetPath {
            org: org.to_string(),
            project: project.to_string(),
            vpc: vpc.to_string(),
            subnet: subnet.to_string(),
        };
        Ok(self
            .objects()
            .into_iter()
            .filter(|b| SubnetPath::parse(&b.child_subnet_path).is_ok_and(|p| p == wanted))
            .collect())
    }

    async fn list_by_cluster(&self, cluster: &str) -> Result<Vec<BackendBinding>, BackendError> {
        if let Some(error) = self.list_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self
            .objects()
            .into_iter()
            .filter(|b| b.tag(TAG_SCOPE_CLUSTER) == Some(cluster))
            .collect())
    }
}

/// Resolver fake serving subnets and subnet sets from memory.
#[derive(Default)]
pub struct FakeResolver {
    subnets: Mutex<HashMap<(String, String), Subnet>>,
    subnet_sets: Mutex<HashMap<(String, String), SubnetSet>>,
    failing: Mutex<bool>,
}

impl FakeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subnet(self, subnet: Subnet) -> Self {
        self.insert_subnet(subnet);
        self
    }

    pub fn with_subnet_set(self, set: SubnetSet) -> Self {
        let key = (
            set.metadata.namespace.clone().unwrap_or_default(),
            set.metadata.name.clone().unwrap_or_default(),
        );
        self.subnet_sets.lock().unwrap().insert(key, set);
        self
    }

    pub fn insert_subnet(&self, subnet: Subnet) {
        let key = (
            subnet.metadata.namespace.clone().unwrap_or_default(),
            subnet.metadata.name.clone().unwrap_or_default(),
        );
        self.subnets.lock().unwrap().insert(key, subnet);
    }

    pub fn fail_lookups(&self) {
        *self.failing.lock().unwrap() = true;
    }
}

#[async_trait::async_trait]
impl SubnetResolver for FakeResolver {
    async fn get_subnet(&self, namespace: &str, name: &str) -> Result<Option<Subnet>> {
        if *self.failing.lock().unwrap() {
            return Err(anyhow!("connection refused"));
        }
        Ok(self
            .subnets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn get_subnet_set(&self, namespace: &str, name: &str) -> Result<Option<SubnetSet>> {
        if *self.failing.lock().unwrap() {
            return Err(anyhow!("connection refused"));
        }
        Ok(self
            .subnet_sets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }
}

/// Binding request client fake.
#[derive(Default)]
pub struct FakeRequests {
    requests: Mutex<HashMap<(String, String), SubnetConnectionBindingMap>>,
    status_writes: Mutex<Vec<(String, SubnetConnectionBindingMapStatus)>>,
    finalizer_removals: Mutex<Vec<String>>,
    list_fails: Mutex<bool>,
}

impl FakeRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request(self, request: SubnetConnectionBindingMap) -> Self {
        self.insert(request);
        self
    }

    pub fn insert(&self, request: SubnetConnectionBindingMap) {
        let key = (
            request.metadata.namespace.clone().unwrap_or_default(),
            request.metadata.name.clone().unwrap_or_default(),
        );
        self.requests.lock().unwrap().insert(key, request);
    }

    pub fn fail_listing(&self) {
        *self.list_fails.lock().unwrap() = true;
    }

    /// Every status write as (`namespace/name`, status).
    pub fn status_writes(&self) -> Vec<(String, SubnetConnectionBindingMapStatus)> {
        self.status_writes.lock().unwrap().clone()
    }

    pub fn finalizer_removals(&self) -> Vec<String> {
        self.finalizer_removals.lock().unwrap().clone()
    }

    fn key_of(request: &SubnetConnectionBindingMap) -> (String, String) {
        (
            request.metadata.namespace.clone().unwrap_or_default(),
            request.metadata.name.clone().unwrap_or_default(),
        )
    }
}

#[async_trait::async_trait]
impl BindingRequestClient for FakeRequests {
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<SubnetConnectionBindingMap>> {
        Ok(self
            .requests
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn list_live_uids(&self) -> Result<HashSet<String>> {
        if *self.list_fails.lock().unwrap() {
            return Err(anyhow!("the server is currently unable to handle the request"));
        }
        Ok(self
            .requests
            .lock()
            .unwrap()
            .values()
            .filter_map(|r| r.metadata.uid.clone())
            .collect())
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &SubnetConnectionBindingMapStatus,
    ) -> Result<()> {
        if let Some(request) = self
            .requests
            .lock()
            .unwrap()
            .get_mut(&(namespace.to_string(), name.to_string()))
        {
            request.status = Some(status.clone());
        }
        self.status_writes
            .lock()
            .unwrap()
            .push((format!("{namespace}/{name}"), status.clone()));
        Ok(())
    }

    async fn ensure_finalizer(&self, request: &SubnetConnectionBindingMap) -> Result<()> {
        let key = Self::key_of(request);
        if let Some(stored) = self.requests.lock().unwrap().get_mut(&key) {
            let finalizers = stored.metadata.finalizers.get_or_insert_with(Vec::new);
            if !finalizers.iter().any(|f| f == crate::constants::BINDING_FINALIZER) {
                finalizers.push(crate::constants::BINDING_FINALIZER.to_string());
            }
        }
        Ok(())
    }

    async fn remove_finalizer(&self, request: &SubnetConnectionBindingMap) -> Result<()> {
        let key = Self::key_of(request);
        self.requests.lock().unwrap().remove(&key);
        self.finalizer_removals
            .lock()
            .unwrap()
            .push(format!("{}/{}", key.0, key.1));
        Ok(())
    }
}

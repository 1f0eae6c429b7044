// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Access to binding requests on the Kubernetes API server.

use crate::constants::BINDING_FINALIZER;
use crate::crd::{SubnetConnectionBindingMap, SubnetConnectionBindingMapStatus};
use crate::reconcilers::finalizers::{ensure_finalizer, remove_finalizer};
use crate::reconcilers::pagination::list_all_paginated;
use crate::reconcilers::retry::retry_api_call;
use anyhow::Result;
use kube::api::{ListParams, Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use std::collections::HashSet;

/// Capability to read and update binding requests.
#[async_trait::async_trait]
pub trait BindingRequestClient: Send + Sync {
    /// Fetch one binding request. `Ok(None)` means it does not exist.
    async fn get(&self, namespace: &str, name: &str)
        -> Result<Option<SubnetConnectionBindingMap>>;

    /// UIDs of every binding request currently stored by the API server.
    ///
    /// Either the complete set or an error; never a partial set.
    async fn list_live_uids(&self) -> Result<HashSet<String>>;

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &SubnetConnectionBindingMapStatus,
    ) -> Result<()>;

    async fn ensure_finalizer(&self, request: &SubnetConnectionBindingMap) -> Result<()>;

    async fn remove_finalizer(&self, request: &SubnetConnectionBindingMap) -> Result<()>;
}

/// [`BindingRequestClient`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeBindingRequestClient {
    client: Client,
}

impl KubeBindingRequestClient {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<SubnetConnectionBindingMap> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait::async_trait]
impl BindingRequestClient for KubeBindingRequestClient {
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<SubnetConnectionBindingMap>> {
        let api = self.api(namespace);
        Ok(retry_api_call(|| api.get_opt(name), "get binding request").await?)
    }

    async fn list_live_uids(&self) -> Result<HashSet<String>> {
        let api: Api<SubnetConnectionBindingMap> = Api::all(self.client.clone());
        let requests = list_all_paginated(&api, ListParams::default()).await?;
        Ok(requests.iter().filter_map(ResourceExt::uid).collect())
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &SubnetConnectionBindingMapStatus,
    ) -> Result<()> {
        let api = self.api(namespace);
        let params = PatchParams::default();
        let patch = Patch::Merge(json!({ "status": status }));
        retry_api_call(
            || api.patch_status(name, &params, &patch),
            "patch binding request status",
        )
        .await?;
        Ok(())
    }

    async fn ensure_finalizer(&self, request: &SubnetConnectionBindingMap) -> Result<()> {
        ensure_finalizer(&self.client, request, BINDING_FINALIZER).await
    }

    async fn remove_finalizer(&self, request: &SubnetConnectionBindingMap) -> Result<()> {
        remove_finalizer(&self.client, request, BINDING_FINALIZER).await
    }
}

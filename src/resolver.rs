// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Lookup of the subnet resources a binding request depends on.

use crate::crd::{Subnet, SubnetSet};
use crate::reconcilers::retry::retry_api_call;
use anyhow::Result;
use kube::{Api, Client};

/// Capability to fetch dependency resources by namespace and name.
///
/// `Ok(None)` means the resource does not exist.
#[async_trait::async_trait]
pub trait SubnetResolver: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the lookup itself failed.
    async fn get_subnet(&self, namespace: &str, name: &str) -> Result<Option<Subnet>>;

    /// # Errors
    ///
    /// Returns an error if the lookup itself failed.
    async fn get_subnet_set(&self, namespace: &str, name: &str) -> Result<Option<SubnetSet>>;
}

/// [`SubnetResolver`] reading from the Kubernetes API server.
#[derive(Clone)]
pub struct KubeSubnetResolver {
    client: Client,
}

impl KubeSubnetResolver {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl SubnetResolver for KubeSubnetResolver {
    async fn get_subnet(&self, namespace: &str, name: &str) -> Result<Option<Subnet>> {
        let api: Api<Subnet> = Api::namespaced(self.client.clone(), namespace);
        Ok(retry_api_call(|| api.get_opt(name), "get subnet").await?)
    }

    async fn get_subnet_set(&self, namespace: &str, name: &str) -> Result<Option<SubnetSet>> {
        let api: Api<SubnetSet> = Api::namespaced(self.client.clone(), namespace);
        Ok(retry_api_call(|| api.get_opt(name), "get subnet set").await?)
    }
}

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the binding controller and the garbage collector.
//!
//! Every collaborator is held behind a narrow capability so reconcilers can be
//! exercised against in-memory fakes:
//! - [`BindingRequestClient`] to read binding requests and write their status
//! - [`SubnetResolver`] to look up subnet dependencies
//! - [`BindingService`] to write the backend and the local store

use crate::requests::{BindingRequestClient, KubeBindingRequestClient};
use crate::resolver::{KubeSubnetResolver, SubnetResolver};
use crate::service::BindingService;
use kube::Client;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared context passed to every reconciliation.
#[derive(Clone)]
pub struct Context {
    pub requests: Arc<dyn BindingRequestClient>,
    pub resolver: Arc<dyn SubnetResolver>,
    pub service: Arc<BindingService>,

    /// Cancelled on shutdown; multi-page commits stop between pages
    pub shutdown: CancellationToken,
}

impl Context {
    #[must_use]
    pub fn new(
        requests: Arc<dyn BindingRequestClient>,
        resolver: Arc<dyn SubnetResolver>,
        service: Arc<BindingService>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            requests,
            resolver,
            service,
            shutdown,
        }
    }

    /// Context reading binding requests and subnets from the API server.
    #[must_use]
    pub fn for_cluster(
        client: Client,
        service: Arc<BindingService>,
        shutdown: CancellationToken,
    ) -> Self {
        Self::new(
            Arc::new(KubeBindingRequestClient::new(client.clone())),
            Arc::new(KubeSubnetResolver::new(client)),
            service,
            shutdown,
        )
    }
}

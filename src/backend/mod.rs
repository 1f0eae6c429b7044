// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Network-policy backend access.
//!
//! The backend stores objects in an org → project → vpc → subnet hierarchy and
//! accepts bulk writes as one nested tree per call. This module defines the
//! object model, the [`BackendClient`] seam used by the rest of the operator,
//! and an HTTP implementation of it.
//!
//! # Contract
//!
//! - `bulk_write` is an idempotent hierarchical PATCH. A stale `_revision`
//!   fails the whole call and must propagate to the caller.
//! - `list_by_path` returns every binding under one subnet, including
//!   backend-assigned fields such as `path` and `_revision`.
//! - `list_by_cluster` returns every binding tagged with the cluster name.

pub mod client;
pub mod types;

pub use client::HttpBackendClient;
pub use types::{vpc_path_of, BackendBinding, SubnetPath, Tag};

use crate::binding_errors::BackendError;
use crate::hierarchy::TreeNode;

/// Capability to read and write binding objects on the backend.
#[async_trait::async_trait]
pub trait BackendClient: Send + Sync {
    /// Submit one hierarchical bulk-write payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the payload or cannot be reached.
    async fn bulk_write(&self, tree: &TreeNode) -> Result<(), BackendError>;

    /// List all bindings stored under one subnet.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be queried.
    async fn list_by_path(
        &self,
        org: &str,
        project: &str,
        vpc: &str,
        subnet: &str,
    ) -> Result<Vec<BackendBinding>, BackendError>;

    /// List all bindings tagged as belonging to `cluster`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be queried.
    async fn list_by_cluster(&self, cluster: &str) -> Result<Vec<BackendBinding>, BackendError>;
}

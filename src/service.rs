// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Binding service: the write path between reconcilers and the backend.
//!
//! [`BindingService`] composes the local store and a backend client. Every
//! backend write goes through [`commit_pages`], and the store is updated
//! from the page callback only, so it never holds a binding the backend has
//! not confirmed.
//!
//! Backend-assigned fields (`path`, `_revision`) are read back after every
//! write. When that read fails, or a write is rejected with a stale revision,
//! the affected subnet is re-read before its bindings are written again.

use crate::backend::{BackendBinding, BackendClient, SubnetPath};
use crate::binding_errors::{BackendError, ReconcileError};
use crate::builder::{binding_changed, build_backend_bindings};
use crate::crd::SubnetConnectionBindingMap;
use crate::hierarchy::commit_pages;
use crate::metrics;
use crate::store::{owner_key, BindingIndex, BindingStore, OwnerIdentity};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct BindingService {
    store: Arc<BindingStore>,
    backend: Arc<dyn BackendClient>,
    cluster: String,
    max_children: usize,
    /// Child subnet paths whose store entries may carry stale revisions
    stale_subnets: Mutex<BTreeSet<String>>,
}

impl BindingService {
    pub fn new(
        store: Arc<BindingStore>,
        backend: Arc<dyn BackendClient>,
        cluster: impl Into<String>,
        max_children: usize,
    ) -> Self {
        Self {
            store,
            backend,
            cluster: cluster.into(),
            max_children,
            stale_subnets: Mutex::new(BTreeSet::new()),
        }
    }

    #[must_use]
    pub fn store(&self) -> &BindingStore {
        &self.store
    }

    #[must_use]
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// Load every binding tagged with this cluster into the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be listed.
    pub async fn initialize(&self) -> Result<usize, BackendError> {
        let bindings = self.backend.list_by_cluster(&self.cluster).await?;
        self.store.apply_many(&bindings);
        info!(
            cluster = %self.cluster,
            bindings = bindings.len(),
            "Loaded existing bindings from backend"
        );
        Ok(bindings.len())
    }

    /// Make the backend hold exactly the bindings derived from `request`.
    ///
    /// New and changed bindings are written, bindings of the same owner that
    /// are no longer desired are deleted in the same commit. Unchanged
    /// bindings cause no backend call. Returns the bindings now realized.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::BackendWrite`] on the first failed commit
    /// (pages committed before it remain reflected in the store) and
    /// [`ReconcileError::BackendList`] when the subnet cannot be read back.
    pub async fn create_or_update(
        &self,
        request: &SubnetConnectionBindingMap,
        child_subnet_path: &str,
        target_subnet_paths: &[String],
        token: &CancellationToken,
    ) -> Result<Vec<BackendBinding>, ReconcileError> {
        if self.take_stale(child_subnet_path) {
            let owned = self
                .store
                .get_by_index(BindingIndex::OwnerName, &request.namespaced_name());
            let ids: HashSet<String> = owned.into_iter().map(|b| b.id).collect();
            if let Err(e) = self.reload_subnet(child_subnet_path, &ids).await {
                self.mark_stale(child_subnet_path);
                return Err(ReconcileError::BackendList(e));
            }
        }

        let desired = build_backend_bindings(
            request,
            &self.cluster,
            child_subnet_path,
            target_subnet_paths,
        );
        let existing: HashMap<String, BackendBinding> = self
            .store
            .get_by_index(BindingIndex::OwnerName, &request.namespaced_name())
            .into_iter()
            .map(|b| (b.id.clone(), b))
            .collect();

        let mut changes: Vec<BackendBinding> = Vec::new();
        for binding in &desired {
            match existing.get(&binding.id) {
                Some(current) if !binding_changed(current, binding) => {}
                Some(current) => {
                    let mut update = binding.clone();
                    update.revision = current.revision;
                    update.path.clone_from(&current.path);
                    changes.push(update);
                }
                None => changes.push(binding.clone()),
            }
        }
        let desired_ids: HashSet<&str> = desired.iter().map(|b| b.id.as_str()).collect();
        let stale: Vec<BackendBinding> = existing
            .values()
            .filter(|b| !desired_ids.contains(b.id.as_str()))
            .map(BackendBinding::tombstoned)
            .collect();

        if changes.is_empty() && stale.is_empty() {
            debug!(
                request = %request.namespaced_name(),
                bindings = desired.len(),
                "Backend bindings already up to date"
            );
            return Ok(desired);
        }

        info!(
            request = %request.namespaced_name(),
            upserts = changes.len(),
            deletes = stale.len(),
            "Writing backend bindings"
        );
        let written: HashSet<String> = changes.iter().map(|b| b.id.clone()).collect();
        let mut objects = changes;
        objects.extend(stale);
        self.commit(objects, token)
            .await
            .map_err(ReconcileError::BackendWrite)?;

        match self.list_subnet(child_subnet_path, &written).await {
            Ok(listed) => self.store.apply_many(&listed),
            Err(e) => {
                warn!(
                    subnet = %child_subnet_path,
                    error = %e,
                    "Failed to read back backend-assigned binding fields"
                );
                self.mark_stale(child_subnet_path);
                return Err(ReconcileError::BackendList(e));
            }
        }
        Ok(desired)
    }

    /// Commit `objects` page by page, updating the store per confirmed page.
    ///
    /// A stale-revision rejection re-reads the affected subnets so the next
    /// attempt carries the backend's current revisions.
    async fn commit(
        &self,
        objects: Vec<BackendBinding>,
        token: &CancellationToken,
    ) -> Result<usize, BackendError> {
        let mut by_subnet: BTreeMap<String, HashSet<String>> = BTreeMap::new();
        for binding in &objects {
            by_subnet
                .entry(binding.child_subnet_path.clone())
                .or_default()
                .insert(binding.id.clone());
        }

        let mut committed = 0;
        let result = commit_pages(
            self.backend.as_ref(),
            objects,
            self.max_children,
            token,
            |page| {
                self.store.apply_many(page);
                committed += page.len();
            },
        )
        .await;

        match result {
            Ok(_) => Ok(committed),
            Err(e) if e.is_stale_revision() => {
                warn!(error = %e, "Backend rejected a stale revision, re-reading affected subnets");
                for (subnet, ids) in &by_subnet {
                    if let Err(reload) = self.reload_subnet(subnet, ids).await {
                        warn!(subnet = %subnet, error = %reload, "Failed to re-read subnet bindings");
                        self.mark_stale(subnet);
                    }
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Bindings among `ids` currently stored on the backend under `child_subnet_path`.
    async fn list_subnet(
        &self,
        child_subnet_path: &str,
        ids: &HashSet<String>,
    ) -> Result<Vec<BackendBinding>, BackendError> {
        let path = SubnetPath::parse(child_subnet_path)?;
        let listed = self
            .backend
            .list_by_path(&path.org, &path.project, &path.vpc, &path.subnet)
            .await?;
        Ok(listed
            .into_iter()
            .filter(|b| ids.contains(&b.id))
            .collect())
    }

    /// Replace the store's copy of `ids` with what the backend holds under
    /// `child_subnet_path`. Entries the backend no longer has are dropped.
    async fn reload_subnet(
        &self,
        child_subnet_path: &str,
        ids: &HashSet<String>,
    ) -> Result<(), BackendError> {
        let listed = self.list_subnet(child_subnet_path, ids).await?;
        let present: HashSet<&str> = listed.iter().map(|b| b.id.as_str()).collect();
        let gone: Vec<BackendBinding> = ids
            .iter()
            .filter(|id| !present.contains(id.as_str()))
            .filter_map(|id| self.store.get_by_key(id))
            .collect();

        self.store.delete_many(&gone);
        self.store.apply_many(&listed);
        debug!(
            subnet = %child_subnet_path,
            refreshed = listed.len(),
            dropped = gone.len(),
            "Re-read subnet bindings from backend"
        );
        Ok(())
    }

    fn mark_stale(&self, child_subnet_path: &str) {
        self.stale_subnets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(child_subnet_path.to_string());
    }

    fn take_stale(&self, child_subnet_path: &str) -> bool {
        self.stale_subnets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(child_subnet_path)
    }

    /// Delete every binding owned by `namespace/name`. Returns how many were deleted.
    ///
    /// # Errors
    ///
    /// Returns the first backend failure.
    pub async fn delete_by_owner(
        &self,
        namespace: &str,
        name: &str,
        token: &CancellationToken,
    ) -> Result<usize, BackendError> {
        let owned = self
            .store
            .get_by_index(BindingIndex::OwnerName, &owner_key(namespace, name));
        if owned.is_empty() {
            debug!(owner = %owner_key(namespace, name), "No backend bindings to delete");
            return Ok(0);
        }
        self.delete_bindings(owned, token).await
    }

    /// Delete `bindings` from the backend and, per committed page, from the store.
    ///
    /// # Errors
    ///
    /// Returns the first backend failure.
    pub async fn delete_bindings(
        &self,
        bindings: Vec<BackendBinding>,
        token: &CancellationToken,
    ) -> Result<usize, BackendError> {
        let tombstones: Vec<BackendBinding> =
            bindings.iter().map(BackendBinding::tombstoned).collect();
        let deleted = self.commit(tombstones, token).await?;

        metrics::record_bindings_deleted(deleted);
        info!(deleted = deleted, "Deleted backend bindings");
        Ok(deleted)
    }

    /// Identities of every binding request the store holds bindings for.
    #[must_use]
    pub fn list_owner_identities(&self) -> BTreeSet<OwnerIdentity> {
        self.store.list_owner_identities()
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod service_tests;

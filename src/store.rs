// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Local indexed store of backend bindings.
//!
//! The store mirrors the bindings this operator has confirmed on the backend.
//! It is shared by every reconcile worker and the garbage collector, so all
//! access goes through a single [`RwLock`]:
//!
//! - the primary map (binding id → binding) and the four secondary indexes are
//!   updated together under one write guard per call;
//! - queries take a read guard and return owned clones, so no caller ever holds
//!   a reference into the maps across calls.
//!
//! Entries are only added after the backend confirmed the write that carried
//! them; the store never runs ahead of the backend.

use crate::backend::BackendBinding;
use crate::builder::recover_owner_identity;
use crate::constants::{TAG_SCOPE_NAMESPACE, TAG_SCOPE_OWNER_NAME, TAG_SCOPE_OWNER_UID};
use crate::metrics;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

/// Secondary indexes maintained by [`BindingStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BindingIndex {
    /// Parent subnet path the child is connected to
    TargetSubnetPath,
    /// Child subnet path owning the binding
    ChildSubnetPath,
    /// UID of the owning binding request
    OwnerUid,
    /// `namespace/name` of the owning binding request
    OwnerName,
}

impl BindingIndex {
    const ALL: [BindingIndex; 4] = [
        BindingIndex::TargetSubnetPath,
        BindingIndex::ChildSubnetPath,
        BindingIndex::OwnerUid,
        BindingIndex::OwnerName,
    ];

    fn value_of(self, binding: &BackendBinding) -> Option<String> {
        match self {
            BindingIndex::TargetSubnetPath => Some(binding.target_subnet_path.clone()),
            BindingIndex::ChildSubnetPath => Some(binding.child_subnet_path.clone()),
            BindingIndex::OwnerUid => binding.tag(TAG_SCOPE_OWNER_UID).map(str::to_string),
            BindingIndex::OwnerName => {
                let namespace = binding.tag(TAG_SCOPE_NAMESPACE)?;
                let name = binding.tag(TAG_SCOPE_OWNER_NAME)?;
                Some(owner_key(namespace, name))
            }
        }
    }
}

/// Key used by [`BindingIndex::OwnerName`].
#[must_use]
pub fn owner_key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

/// Identity of a binding request owning backend bindings.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerIdentity {
    pub namespace: String,
    pub name: String,
    pub uid: String,
}

impl OwnerIdentity {
    #[must_use]
    pub fn namespaced_name(&self) -> String {
        owner_key(&self.namespace, &self.name)
    }
}

impl fmt::Display for OwnerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({})", self.namespace, self.name, self.uid)
    }
}

type Index = HashMap<String, HashSet<String>>;

#[derive(Default)]
struct StoreInner {
    objects: HashMap<String, BackendBinding>,
    indexes: HashMap<BindingIndex, Index>,
}

impl StoreInner {
    fn unindex(&mut self, binding: &BackendBinding) {
        for index in BindingIndex::ALL {
            let Some(value) = index.value_of(binding) else {
                continue;
            };
            if let Some(entries) = self.indexes.get_mut(&index) {
                if let Some(keys) = entries.get_mut(&value) {
                    keys.remove(&binding.id);
                    if keys.is_empty() {
                        entries.remove(&value);
                    }
                }
            }
        }
    }

    fn index(&mut self, binding: &BackendBinding) {
        for index in BindingIndex::ALL {
            if let Some(value) = index.value_of(binding) {
                self.indexes
                    .entry(index)
                    .or_default()
                    .entry(value)
                    .or_default()
                    .insert(binding.id.clone());
            }
        }
    }

    fn remove(&mut self, id: &str) {
        if let Some(old) = self.objects.remove(id) {
            self.unindex(&old);
        }
    }

    fn apply(&mut self, binding: &BackendBinding) {
        self.remove(&binding.id);
        if !binding.marked_for_delete {
            self.index(binding);
            self.objects.insert(binding.id.clone(), binding.clone());
        }
    }

    fn keys(&self, index: BindingIndex, value: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .indexes
            .get(&index)
            .and_then(|entries| entries.get(value))
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

/// Concurrency-safe cache of backend bindings with secondary indexes.
#[derive(Default)]
pub struct BindingStore {
    inner: RwLock<StoreInner>,
}

impl BindingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Mutations never panic between map and index updates, so a poisoned
    // guard still protects consistent maps.
    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Upsert `binding`, or remove it when it is marked for delete.
    pub fn apply(&self, binding: &BackendBinding) {
        let mut inner = self.write();
        inner.apply(binding);
        metrics::set_store_size(inner.objects.len());
    }

    /// Apply every binding in `bindings` under one write guard.
    pub fn apply_many(&self, bindings: &[BackendBinding]) {
        let mut inner = self.write();
        for binding in bindings {
            inner.apply(binding);
        }
        metrics::set_store_size(inner.objects.len());
    }

    /// Remove every binding in `bindings`, regardless of its tombstone flag.
    pub fn delete_many(&self, bindings: &[BackendBinding]) {
        let mut inner = self.write();
        for binding in bindings {
            inner.remove(&binding.id);
        }
        metrics::set_store_size(inner.objects.len());
    }

    #[must_use]
    pub fn get_by_key(&self, id: &str) -> Option<BackendBinding> {
        self.read().objects.get(id).cloned()
    }

    /// All bindings whose `index` value equals `value`, ordered by id.
    #[must_use]
    pub fn get_by_index(&self, index: BindingIndex, value: &str) -> Vec<BackendBinding> {
        let inner = self.read();
        inner
            .keys(index, value)
            .iter()
            .filter_map(|key| inner.objects.get(key).cloned())
            .collect()
    }

    /// Identities of every binding request owning at least one binding.
    ///
    /// Owners are found through the owner-UID index and their identity is
    /// recovered from the tags of one of their bindings. Bindings whose tags
    /// cannot be recovered are skipped.
    #[must_use]
    pub fn list_owner_identities(&self) -> BTreeSet<OwnerIdentity> {
        let inner = self.read();
        let Some(by_uid) = inner.indexes.get(&BindingIndex::OwnerUid) else {
            return BTreeSet::new();
        };

        by_uid
            .values()
            .filter_map(|keys| keys.iter().find_map(|key| inner.objects.get(key)))
            .filter_map(|binding| match recover_owner_identity(binding) {
                Ok(owner) => Some(owner),
                Err(e) => {
                    warn!(error = %e, "Skipping binding with unrecoverable owner");
                    None
                }
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().objects.is_empty()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Derivation of backend bindings from binding requests, and back.

use crate::backend::{BackendBinding, Tag};
use crate::binding_errors::MissingOwnerTag;
use crate::constants::{
    MAX_ID_NAME_LEN, RESOURCE_TYPE_BINDING, SHORT_HASH_LEN, TAG_SCOPE_CLUSTER,
    TAG_SCOPE_NAMESPACE, TAG_SCOPE_OWNER_NAME, TAG_SCOPE_OWNER_UID,
};
use crate::crd::SubnetConnectionBindingMap;
use crate::store::OwnerIdentity;
use kube::ResourceExt;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

fn short_hash(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    let mut hex = String::with_capacity(SHORT_HASH_LEN);
    for byte in digest.iter().take(SHORT_HASH_LEN.div_ceil(2)) {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex.truncate(SHORT_HASH_LEN);
    hex
}

fn id_name(owner_name: &str) -> String {
    if owner_name.chars().count() <= MAX_ID_NAME_LEN {
        return owner_name.to_string();
    }
    let keep = MAX_ID_NAME_LEN - SHORT_HASH_LEN - 1;
    let prefix: String = owner_name.chars().take(keep).collect();
    format!("{prefix}-{}", short_hash(owner_name))
}

/// Deterministic backend id for the binding of `owner_name` to `target_path`.
///
/// The id is `<owner>_<hash>`, where `<hash>` is a short SHA-256 of the target
/// subnet path. Owner names longer than the backend allows are truncated and
/// suffixed with a hash of the full name.
#[must_use]
pub fn binding_id(owner_name: &str, target_path: &str) -> String {
    format!("{}_{}", id_name(owner_name), short_hash(target_path))
}

/// Identity of the binding request itself.
#[must_use]
pub fn owner_identity_from_request(request: &SubnetConnectionBindingMap) -> OwnerIdentity {
    OwnerIdentity {
        namespace: request.namespace().unwrap_or_default(),
        name: request.name_any(),
        uid: request.uid().unwrap_or_default(),
    }
}

/// One backend binding per target subnet path.
///
/// Duplicate target paths produce a single binding.
#[must_use]
pub fn build_backend_bindings(
    request: &SubnetConnectionBindingMap,
    cluster: &str,
    child_subnet_path: &str,
    target_subnet_paths: &[String],
) -> Vec<BackendBinding> {
    let owner = owner_identity_from_request(request);
    let tags = vec![
        Tag::new(TAG_SCOPE_CLUSTER, cluster),
        Tag::new(TAG_SCOPE_NAMESPACE, owner.namespace.as_str()),
        Tag::new(TAG_SCOPE_OWNER_NAME, owner.name.as_str()),
        Tag::new(TAG_SCOPE_OWNER_UID, owner.uid.as_str()),
    ];

    let targets: BTreeSet<&String> = target_subnet_paths.iter().collect();
    targets
        .into_iter()
        .map(|target| BackendBinding {
            id: binding_id(&owner.name, target),
            display_name: owner.name.clone(),
            resource_type: RESOURCE_TYPE_BINDING.to_string(),
            vlan_traffic_tag: request.spec.vlan_traffic_tag,
            target_subnet_path: target.clone(),
            child_subnet_path: child_subnet_path.to_string(),
            tags: tags.clone(),
            marked_for_delete: false,
            path: None,
            revision: None,
        })
        .collect()
}

/// Recover the owning binding request identity from a binding's tags.
///
/// # Errors
///
/// Returns [`MissingOwnerTag`] naming the first absent namespace, name or uid tag.
pub fn recover_owner_identity(binding: &BackendBinding) -> Result<OwnerIdentity, MissingOwnerTag> {
    let required = |scope: &'static str| {
        binding
            .tag(scope)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| MissingOwnerTag {
                id: binding.id.clone(),
                scope,
            })
    };

    Ok(OwnerIdentity {
        namespace: required(TAG_SCOPE_NAMESPACE)?,
        name: required(TAG_SCOPE_OWNER_NAME)?,
        uid: required(TAG_SCOPE_OWNER_UID)?,
    })
}

/// Whether `desired` differs from `existing` in any field the operator owns.
///
/// Backend-assigned fields (`path`, `_revision`) are ignored; tags are compared
/// as sets.
#[must_use]
pub fn binding_changed(existing: &BackendBinding, desired: &BackendBinding) -> bool {
    let tags = |b: &BackendBinding| b.tags.iter().cloned().collect::<BTreeSet<Tag>>();

    existing.display_name != desired.display_name
        || existing.vlan_traffic_tag != desired.vlan_traffic_tag
        || existing.target_subnet_path != desired.target_subnet_path
        || existing.child_subnet_path != desired.child_subnet_path
        || tags(existing) != tags(desired)
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod builder_tests;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer management for namespaced custom resources.
//!
//! The binding controller keeps a finalizer on every binding request so that
//! a delete is observed while the object still exists; the backend objects are
//! removed first and the finalizer is released afterwards.
//!
//! # Example
//!
//! ```rust,ignore
//! use subnetbind::reconcilers::finalizers::{ensure_finalizer, remove_finalizer};
//! use subnetbind::constants::BINDING_FINALIZER;
//!
//! ensure_finalizer(&client, &request, BINDING_FINALIZER).await?;
//! if request.metadata.deletion_timestamp.is_some() {
//!     // remove backend objects, then:
//!     remove_finalizer(&client, &request, BINDING_FINALIZER).await?;
//! }
//! ```

use anyhow::Result;
use kube::api::{Patch, PatchParams};
use kube::core::NamespaceResourceScope;
use kube::{Api, Client, Resource, ResourceExt};
use crate::reconcilers::retry::is_not_found;
use serde_json::json;
use tracing::{debug, info};

/// Whether `resource` currently carries `finalizer`.
#[must_use]
pub fn has_finalizer<T: Resource>(resource: &T, finalizer: &str) -> bool {
    resource
        .meta()
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|item| item == finalizer))
}

/// Finalizer list with `finalizer` appended, or `None` if already present.
#[must_use]
pub fn finalizers_with(current: Option<&Vec<String>>, finalizer: &str) -> Option<Vec<String>> {
    let mut finalizers = current.cloned().unwrap_or_default();
    if finalizers.iter().any(|f| f == finalizer) {
        return None;
    }
    finalizers.push(finalizer.to_string());
    Some(finalizers)
}

/// Finalizer list with `finalizer` removed, or `None` if it was absent.
#[must_use]
pub fn finalizers_without(current: Option<&Vec<String>>, finalizer: &str) -> Option<Vec<String>> {
    let finalizers = current?;
    if !finalizers.iter().any(|f| f == finalizer) {
        return None;
    }
    Some(
        finalizers
            .iter()
            .filter(|f| *f != finalizer)
            .cloned()
            .collect(),
    )
}

async fn patch_finalizers<T>(
    client: &Client,
    resource: &T,
    finalizers: Vec<String>,
) -> Result<(), kube::Error>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + std::fmt::Debug
        + serde::de::DeserializeOwned,
{
    let namespace = resource.namespace().unwrap_or_default();
    let api: Api<T> = Api::namespaced(client.clone(), &namespace);
    let patch = json!({ "metadata": { "finalizers": finalizers } });
    api.patch(&resource.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    Ok(())
}

/// Add a finalizer to a resource if not already present.
///
/// # Errors
///
/// Returns an error if the API patch operation fails.
pub async fn ensure_finalizer<T>(client: &Client, resource: &T, finalizer: &str) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + std::fmt::Debug
        + serde::de::DeserializeOwned,
{
    let Some(finalizers) = finalizers_with(resource.meta().finalizers.as_ref(), finalizer) else {
        return Ok(());
    };

    patch_finalizers(client, resource, finalizers).await?;
    info!(
        "Added finalizer {} to {}/{} {}",
        finalizer,
        resource.namespace().unwrap_or_default(),
        resource.name_any(),
        T::kind(&())
    );
    Ok(())
}

/// Remove a finalizer from a resource if present.
///
/// A resource that no longer exists counts as released.
///
/// # Errors
///
/// Returns an error if the API patch operation fails.
pub async fn remove_finalizer<T>(client: &Client, resource: &T, finalizer: &str) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + std::fmt::Debug
        + serde::de::DeserializeOwned,
{
    let Some(finalizers) = finalizers_without(resource.meta().finalizers.as_ref(), finalizer)
    else {
        return Ok(());
    };

    match patch_finalizers(client, resource, finalizers).await {
        Err(e) if is_not_found(&e) => {
            debug!(
                "{}/{} already gone, nothing to release",
                resource.namespace().unwrap_or_default(),
                resource.name_any()
            );
            return Ok(());
        }
        result => result?,
    }
    info!(
        "Removed finalizer {} from {}/{} {}",
        finalizer,
        resource.namespace().unwrap_or_default(),
        resource.name_any(),
        T::kind(&())
    );
    Ok(())
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Dependency validation of binding requests.
//!
//! A binding request can only be realized once its child subnet and its
//! target subnet (or every usable member of its target subnet set) exist on
//! the backend. Validation runs these checks in order:
//!
//! 1. The request names exactly one kind of target.
//! 2. The child subnet exists and is realized.
//! 3. The target subnet exists, is not pre-provisioned, and is realized; or
//!    the target subnet set exists and has at least one realized member.
//! 4. Neither side is already used with the opposite role by another owner.
//! 5. A pre-provisioned child lives in the same VPC as every target.
//!
//! Failures of step 4 are retryable. All other failures are permanent and wait
//! for a watch event on the blocking dependency.

use crate::backend::{vpc_path_of, BackendBinding};
use crate::binding_errors::{DependencyError, DependencyErrorKind};
use crate::constants::{TAG_SCOPE_NAMESPACE, TAG_SCOPE_OWNER_NAME, TAG_SCOPE_OWNER_UID};
use crate::crd::{Subnet, SubnetConnectionBindingMap};
use crate::resolver::SubnetResolver;
use crate::store::{BindingIndex, BindingStore};
use kube::ResourceExt;
use tracing::debug;

/// Backend paths a valid binding request resolves to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedDependencies {
    pub child_subnet_path: String,
    pub target_subnet_paths: Vec<String>,
}

fn owner_label(binding: &BackendBinding) -> String {
    match (binding.tag(TAG_SCOPE_NAMESPACE), binding.tag(TAG_SCOPE_OWNER_NAME)) {
        (Some(namespace), Some(name)) => format!("{namespace}/{name}"),
        _ => binding.id.clone(),
    }
}

async fn fetch_subnet(
    resolver: &dyn SubnetResolver,
    namespace: &str,
    name: &str,
) -> Result<Subnet, DependencyError> {
    match resolver.get_subnet(namespace, name).await {
        Ok(Some(subnet)) => Ok(subnet),
        Ok(None) => Err(DependencyError::new(
            DependencyErrorKind::ResourceNotFound,
            format!("Subnet CR {name} does not exist"),
            format!("subnet {namespace}/{name} not found"),
        )),
        Err(e) => Err(DependencyError::new(
            DependencyErrorKind::ResourceNotFound,
            format!("Unable to get Subnet CR {name}"),
            format!("failed to get subnet {namespace}/{name}: {e:#}"),
        )),
    }
}

fn realized_path(subnet: &Subnet) -> Result<String, DependencyError> {
    subnet.realized_path().ok_or_else(|| {
        let name = subnet.name_any();
        DependencyError::new(
            DependencyErrorKind::DependencyUnready,
            format!("Subnet CR {name} is not realized on the backend"),
            format!(
                "subnet {}/{name} has no backend path (associated: {}, ready: {})",
                subnet.namespace().unwrap_or_default(),
                subnet.is_associated(),
                subnet.is_ready()
            ),
        )
    })
}

enum TargetRef<'a> {
    Subnet(&'a str),
    SubnetSet(&'a str),
}

fn check_spec(request: &SubnetConnectionBindingMap) -> Result<TargetRef<'_>, DependencyError> {
    let spec = &request.spec;
    if spec.subnet_name.is_empty() {
        return Err(DependencyError::new(
            DependencyErrorKind::InvalidSpec,
            "subnetName must be set",
            format!("binding request {} has an empty subnetName", request.namespaced_name()),
        ));
    }
    match (&spec.target_subnet_name, &spec.target_subnet_set_name) {
        (Some(target), None) if !target.is_empty() => Ok(TargetRef::Subnet(target)),
        (None, Some(set)) if !set.is_empty() => Ok(TargetRef::SubnetSet(set)),
        _ => Err(DependencyError::new(
            DependencyErrorKind::InvalidSpec,
            "Exactly one of targetSubnetName and targetSubnetSetName must be set",
            format!(
                "binding request {} sets targetSubnetName={:?} targetSubnetSetName={:?}",
                request.namespaced_name(),
                spec.target_subnet_name,
                spec.target_subnet_set_name
            ),
        )),
    }
}

async fn resolve_targets(
    target: TargetRef<'_>,
    resolver: &dyn SubnetResolver,
    namespace: &str,
) -> Result<Vec<String>, DependencyError> {
    match target {
        TargetRef::Subnet(target) => {
            let subnet = fetch_subnet(resolver, namespace, target).await?;
            if subnet.is_associated() {
                return Err(DependencyError::new(
                    DependencyErrorKind::PreProvisionedTargetRejected,
                    format!("Target Subnet CR {target} is a pre-provisioned subnet and cannot be a connection target"),
                    format!("target subnet {namespace}/{target} carries the associated-resource annotation"),
                ));
            }
            Ok(vec![realized_path(&subnet)?])
        }
        TargetRef::SubnetSet(set_name) => {
            let set = match resolver.get_subnet_set(namespace, set_name).await {
                Ok(Some(set)) => set,
                Ok(None) => {
                    return Err(DependencyError::new(
                        DependencyErrorKind::ResourceNotFound,
                        format!("SubnetSet CR {set_name} does not exist"),
                        format!("subnet set {namespace}/{set_name} not found"),
                    ))
                }
                Err(e) => {
                    return Err(DependencyError::new(
                        DependencyErrorKind::ResourceNotFound,
                        format!("Unable to get SubnetSet CR {set_name}"),
                        format!("failed to get subnet set {namespace}/{set_name}: {e:#}"),
                    ))
                }
            };
            let paths = set.realized_paths();
            if paths.is_empty() {
                return Err(DependencyError::new(
                    DependencyErrorKind::DependencyUnready,
                    format!("SubnetSet CR {set_name} has no realized Subnet"),
                    format!("subnet set {namespace}/{set_name} lists no realized member"),
                ));
            }
            Ok(paths)
        }
    }
}

/// First binding of another owner indexed under `index` = `path`.
fn conflicting_binding(
    store: &BindingStore,
    index: BindingIndex,
    path: &str,
    own_uid: &str,
) -> Option<BackendBinding> {
    store
        .get_by_index(index, path)
        .into_iter()
        .find(|b| b.tag(TAG_SCOPE_OWNER_UID) != Some(own_uid))
}

fn check_uniqueness(
    store: &BindingStore,
    request: &SubnetConnectionBindingMap,
    child_path: &str,
    target_paths: &[String],
) -> Result<(), DependencyError> {
    let own_uid = request.uid().unwrap_or_default();
    let child_name = &request.spec.subnet_name;

    if let Some(other) =
        conflicting_binding(store, BindingIndex::TargetSubnetPath, child_path, &own_uid)
    {
        let owner = owner_label(&other);
        return Err(DependencyError::new(
            DependencyErrorKind::NestedBindingConflict,
            format!("Subnet CR {child_name} is already used as a target by SubnetConnectionBindingMap {owner}"),
            format!("child subnet {child_path} is the target of backend binding {} owned by {owner}", other.id),
        ));
    }

    for target in target_paths {
        if let Some(other) =
            conflicting_binding(store, BindingIndex::ChildSubnetPath, target, &own_uid)
        {
            let owner = owner_label(&other);
            return Err(DependencyError::new(
                DependencyErrorKind::NestedBindingConflict,
                format!("Target subnet {target} is already bound as a child by SubnetConnectionBindingMap {owner}"),
                format!("target subnet {target} is the child of backend binding {} owned by {owner}", other.id),
            ));
        }
    }
    Ok(())
}

fn check_same_vpc(child_path: &str, target_paths: &[String]) -> Result<(), DependencyError> {
    let child_vpc = vpc_path_of(child_path);
    for target in target_paths {
        let target_vpc = vpc_path_of(target);
        if child_vpc.is_none() || child_vpc != target_vpc {
            return Err(DependencyError::new(
                DependencyErrorKind::CrossDomainMismatch,
                "The pre-provisioned Subnet and its target Subnet must be in the same VPC",
                format!(
                    "child subnet {child_path} is in VPC {child_vpc:?}, target {target} is in VPC {target_vpc:?}"
                ),
            ));
        }
    }
    Ok(())
}

/// Validate the dependencies of `request`.
///
/// # Errors
///
/// Returns a [`DependencyError`] whose kind tells whether the failure is
/// retryable and whose `message` is fit for the request's status.
pub async fn validate(
    request: &SubnetConnectionBindingMap,
    resolver: &dyn SubnetResolver,
    store: &BindingStore,
) -> Result<ResolvedDependencies, DependencyError> {
    let namespace = request.namespace().unwrap_or_default();
    let target = check_spec(request)?;

    let child = fetch_subnet(resolver, &namespace, &request.spec.subnet_name).await?;
    let child_subnet_path = realized_path(&child)?;
    let target_subnet_paths = resolve_targets(target, resolver, &namespace).await?;

    check_uniqueness(store, request, &child_subnet_path, &target_subnet_paths)?;

    if child.is_associated() {
        check_same_vpc(&child_subnet_path, &target_subnet_paths)?;
    }

    debug!(
        request = %request.namespaced_name(),
        child = %child_subnet_path,
        targets = target_subnet_paths.len(),
        "Binding request dependencies validated"
    );
    Ok(ResolvedDependencies {
        child_subnet_path,
        target_subnet_paths,
    })
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod validation_tests;

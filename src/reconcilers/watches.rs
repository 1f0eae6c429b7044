// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Watch mappers and predicates for binding request dependencies.
//!
//! Permanent dependency failures are never retried on a timer, so every state a
//! dependency error can point at must produce an event here:
//!
//! - a `Subnet` gaining or losing its backend path or `Ready` condition
//! - a `Subnet` gaining or losing the associated-resource annotation
//! - a `SubnetSet` whose set of realized member paths changes
//!
//! The predicates hash exactly that state, so `predicate_filter` passes an
//! object only on a readiness flip and drops plain status churn.

use crate::crd::{Subnet, SubnetConnectionBindingMap, SubnetSet};
use kube::runtime::reflector::ObjectRef;
use kube::ResourceExt;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

fn hash_of(value: impl Hash) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Readiness fingerprint of a subnet.
#[must_use]
pub fn subnet_readiness(subnet: &Subnet) -> Option<u64> {
    Some(hash_of((
        subnet.realized_path(),
        subnet.is_ready(),
        subnet.is_associated(),
    )))
}

/// Readiness fingerprint of a subnet set.
#[must_use]
pub fn subnet_set_readiness(set: &SubnetSet) -> Option<u64> {
    let mut paths = set.realized_paths();
    paths.sort();
    Some(hash_of(paths))
}

fn same_namespace(request: &SubnetConnectionBindingMap, namespace: Option<&String>) -> bool {
    request.metadata.namespace.as_ref() == namespace
}

/// Binding requests in the subnet's namespace that use it as child or target.
#[must_use]
pub fn requests_for_subnet(
    requests: &[Arc<SubnetConnectionBindingMap>],
    subnet: &Subnet,
) -> Vec<ObjectRef<SubnetConnectionBindingMap>> {
    let name = subnet.name_any();
    let namespace = subnet.metadata.namespace.as_ref();
    requests
        .iter()
        .filter(|r| same_namespace(r, namespace))
        .filter(|r| {
            r.spec.subnet_name == name || r.spec.target_subnet_name.as_deref() == Some(&name)
        })
        .map(|r| ObjectRef::from_obj(r.as_ref()))
        .collect()
}

/// Binding requests in the set's namespace that target it.
#[must_use]
pub fn requests_for_subnet_set(
    requests: &[Arc<SubnetConnectionBindingMap>],
    set: &SubnetSet,
) -> Vec<ObjectRef<SubnetConnectionBindingMap>> {
    let name = set.name_any();
    let namespace = set.metadata.namespace.as_ref();
    requests
        .iter()
        .filter(|r| same_namespace(r, namespace))
        .filter(|r| r.spec.target_subnet_set_name.as_deref() == Some(&name))
        .map(|r| ObjectRef::from_obj(r.as_ref()))
        .collect()
}

#[cfg(test)]
#[path = "watches_tests.rs"]
mod watches_tests;

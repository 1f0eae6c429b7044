// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for subnet connection bindings.
//!
//! This module defines the Kubernetes resources the operator reads and writes.
//!
//! # Resource Types
//!
//! - [`SubnetConnectionBindingMap`] - Binds a child subnet to one or more parent
//!   subnets with a VLAN tag. Owned by this operator (status is written here).
//! - [`Subnet`] - A VPC subnet. Realized by a sibling controller; read-only here.
//! - [`SubnetSet`] - A group of VPC subnets. Realized by a sibling controller;
//!   read-only here.
//!
//! # Example: Binding a subnet to a parent subnet
//!
//! ```rust,no_run
//! use subnetbind::crd::SubnetConnectionBindingMapSpec;
//!
//! let spec = SubnetConnectionBindingMapSpec {
//!     subnet_name: "child-subnet".to_string(),
//!     target_subnet_name: Some("parent-subnet".to_string()),
//!     target_subnet_set_name: None,
//!     vlan_traffic_tag: 101,
//! };
//! ```

use crate::constants::{ASSOCIATED_RESOURCE_ANNOTATION, DEFAULT_ORG_ID};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition represents an observation of a resource's current state.
///
/// Conditions are used in status subresources to communicate the state of
/// a resource to users and controllers.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition. The operator only writes `Ready`.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// `SubnetConnectionBindingMap` binds a child subnet to parent subnets.
///
/// Exactly one of `targetSubnetName` and `targetSubnetSetName` must be set.
/// When a subnet set is targeted, one backend binding is produced per realized
/// member of the set.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "network.subnetbind.io",
    version = "v1alpha1",
    kind = "SubnetConnectionBindingMap",
    shortname = "scbm",
    namespaced,
    doc = "SubnetConnectionBindingMap connects a child Subnet to a parent Subnet or to every Subnet of a SubnetSet, tagging the traffic with a VLAN id."
)]
#[kube(status = "SubnetConnectionBindingMapStatus")]
#[kube(
    printcolumn = r#"{"name":"Subnet","type":"string","jsonPath":".spec.subnetName"}"#,
    printcolumn = r#"{"name":"VLAN","type":"integer","jsonPath":".spec.vlanTrafficTag"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SubnetConnectionBindingMapSpec {
    /// Name of the child `Subnet` in the same namespace.
    pub subnet_name: String,

    /// Name of the parent `Subnet` in the same namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_subnet_name: Option<String>,

    /// Name of the parent `SubnetSet` in the same namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_subnet_set_name: Option<String>,

    /// VLAN tag applied to traffic from the child subnet on the parent subnet.
    pub vlan_traffic_tag: i64,
}

/// `SubnetConnectionBindingMap` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubnetConnectionBindingMapStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// `Subnet` is a VPC subnet realized on the backend by a sibling controller.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "network.subnetbind.io",
    version = "v1alpha1",
    kind = "Subnet",
    namespaced,
    doc = "Subnet is a VPC subnet. Its status carries the backend path once the subnet has been realized."
)]
#[kube(status = "SubnetStatus")]
#[serde(rename_all = "camelCase")]
pub struct SubnetSpec {
    /// Access mode of the subnet (Private, Public, PrivateTGW).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_mode: Option<String>,

    /// Requested IPv4 subnet size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_subnet_size: Option<i64>,
}

/// `Subnet` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubnetStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Backend path of the realized subnet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_path: Option<String>,

    #[serde(default)]
    pub network_addresses: Vec<String>,
}

/// `SubnetSet` is a group of VPC subnets that grows on demand.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "network.subnetbind.io",
    version = "v1alpha1",
    kind = "SubnetSet",
    namespaced,
    doc = "SubnetSet is a group of VPC subnets. Its status lists every realized member subnet."
)]
#[kube(status = "SubnetSetStatus")]
#[serde(rename_all = "camelCase")]
pub struct SubnetSetSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_mode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_subnet_size: Option<i64>,
}

/// `SubnetSet` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubnetSetStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Realized member subnets.
    #[serde(default)]
    pub subnets: Vec<SubnetInfo>,
}

/// A realized member of a `SubnetSet`.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubnetInfo {
    pub backend_path: String,

    #[serde(default)]
    pub network_addresses: Vec<String>,
}

impl SubnetConnectionBindingMap {
    /// `namespace/name` of this binding request.
    #[must_use]
    pub fn namespaced_name(&self) -> String {
        format!("{}/{}", self.namespace().unwrap_or_default(), self.name_any())
    }

    /// Current `Ready` condition, if one has been written.
    #[must_use]
    pub fn ready_condition(&self) -> Option<&Condition> {
        self.status
            .as_ref()
            .and_then(|s| s.conditions.iter().find(|c| c.r#type == "Ready"))
    }
}

impl Subnet {
    /// Whether this subnet was pre-provisioned outside the operator.
    #[must_use]
    pub fn is_associated(&self) -> bool {
        self.annotations()
            .contains_key(ASSOCIATED_RESOURCE_ANNOTATION)
    }

    /// Whether the subnet reports `Ready=True`.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status.as_ref().is_some_and(|s| {
            s.conditions
                .iter()
                .any(|c| c.r#type == "Ready" && c.status == "True")
        })
    }

    /// Backend path of the subnet if it has been realized.
    ///
    /// Pre-provisioned subnets derive their path from the associated-resource
    /// annotation and only count as realized once they report `Ready=True`.
    #[must_use]
    pub fn realized_path(&self) -> Option<String> {
        if self.is_associated() {
            if !self.is_ready() {
                return None;
            }
            return self
                .annotations()
                .get(ASSOCIATED_RESOURCE_ANNOTATION)
                .and_then(|value| associated_subnet_path(value));
        }
        self.status
            .as_ref()
            .and_then(|s| s.backend_path.clone())
            .filter(|p| !p.is_empty())
    }
}

impl SubnetSet {
    /// Backend paths of every realized member subnet.
    #[must_use]
    pub fn realized_paths(&self) -> Vec<String> {
        self.status
            .as_ref()
            .map(|s| {
                s.subnets
                    .iter()
                    .map(|info| info.backend_path.clone())
                    .filter(|p| !p.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Convert an associated-resource annotation value into a backend subnet path.
///
/// Accepts `<project>:<vpc>:<subnet>` (default org) or
/// `<org>:<project>:<vpc>:<subnet>`. Returns `None` for anything else.
#[must_use]
pub fn associated_subnet_path(value: &str) -> Option<String> {
    let parts: Vec<&str> = value.split(':').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    let (org, project, vpc, subnet) = match parts.as_slice() {
        [project, vpc, subnet] => (DEFAULT_ORG_ID, *project, *vpc, *subnet),
        [org, project, vpc, subnet] => (*org, *project, *vpc, *subnet),
        _ => return None,
    };
    Some(format!(
        "/orgs/{org}/projects/{project}/vpcs/{vpc}/subnets/{subnet}"
    ))
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;

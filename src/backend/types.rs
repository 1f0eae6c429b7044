// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Backend object model for subnet connection bindings.

use crate::binding_errors::BackendError;
use crate::constants::{BINDING_PATH_SEGMENT, RESOURCE_TYPE_BINDING};
use serde::{Deserialize, Serialize};

/// A scope/value pair attached to backend objects.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    pub scope: String,
    pub tag: String,
}

impl Tag {
    pub fn new(scope: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            tag: tag.into(),
        }
    }
}

fn default_resource_type() -> String {
    RESOURCE_TYPE_BINDING.to_string()
}

/// A binding object as stored on the backend.
///
/// The backend names the parent of an object in its hierarchy `parent_path`;
/// for a binding that parent is the child subnet. The parent subnet the child
/// is connected to is stored as `subnet_path`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendBinding {
    pub id: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    pub vlan_traffic_tag: i64,

    /// Parent subnet the child subnet is connected to
    #[serde(rename = "subnet_path")]
    pub target_subnet_path: String,

    /// Child subnet owning this binding
    #[serde(rename = "parent_path")]
    pub child_subnet_path: String,

    #[serde(default)]
    pub tags: Vec<Tag>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub marked_for_delete: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(rename = "_revision", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<i64>,
}

impl BackendBinding {
    /// Value of the first tag with the given scope.
    #[must_use]
    pub fn tag(&self, scope: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.scope == scope)
            .map(|t| t.tag.as_str())
    }

    /// Fully-qualified hierarchical path of this binding.
    ///
    /// Falls back to deriving the path from the child subnet when the backend
    /// has not reported one yet.
    #[must_use]
    pub fn hierarchy_path(&self) -> String {
        self.path.clone().unwrap_or_else(|| {
            format!(
                "{}/{}/{}",
                self.child_subnet_path.trim_end_matches('/'),
                BINDING_PATH_SEGMENT,
                self.id
            )
        })
    }

    /// A copy of this binding marked for deletion.
    #[must_use]
    pub fn tombstoned(&self) -> Self {
        let mut copy = self.clone();
        copy.marked_for_delete = true;
        copy
    }
}

/// The four ancestry segments of a subnet in the backend hierarchy.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubnetPath {
    pub org: String,
    pub project: String,
    pub vpc: String,
    pub subnet: String,
}

impl SubnetPath {
    /// Parse a subnet path or a binding path nested under a subnet.
    ///
    /// Accepted forms:
    /// - `/orgs/{org}/projects/{project}/vpcs/{vpc}/subnets/{subnet}`
    /// - `/orgs/{org}/projects/{project}/vpcs/{vpc}/subnets/{subnet}/subnet-connection-binding-maps/{id}`
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidPath`] for any other layout.
    pub fn parse(path: &str) -> Result<Self, BackendError> {
        let invalid = |reason: &str| BackendError::InvalidPath {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        let (org, project, vpc, subnet) = match segments.as_slice() {
            ["orgs", org, "projects", project, "vpcs", vpc, "subnets", subnet]
            | ["orgs", org, "projects", project, "vpcs", vpc, "subnets", subnet, BINDING_PATH_SEGMENT, _] => {
                (*org, *project, *vpc, *subnet)
            }
            _ => return Err(invalid("expected /orgs/*/projects/*/vpcs/*/subnets/*")),
        };
        if [org, project, vpc, subnet].iter().any(|s| s.is_empty()) {
            return Err(invalid("empty path segment"));
        }

        Ok(Self {
            org: org.to_string(),
            project: project.to_string(),
            vpc: vpc.to_string(),
            subnet: subnet.to_string(),
        })
    }

    /// Path of the VPC containing this subnet.
    #[must_use]
    pub fn vpc_path(&self) -> String {
        format!(
            "/orgs/{}/projects/{}/vpcs/{}",
            self.org, self.project, self.vpc
        )
    }

    /// Path of this subnet.
    #[must_use]
    pub fn to_path(&self) -> String {
        format!("{}/subnets/{}", self.vpc_path(), self.subnet)
    }
}

/// VPC path of a subnet path, or `None` when the path does not parse.
#[must_use]
pub fn vpc_path_of(path: &str) -> Option<String> {
    SubnetPath::parse(path).ok().map(|p| p.vpc_path())
}

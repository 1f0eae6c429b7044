// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Hierarchical bulk-write payloads.
//!
//! The backend accepts one nested tree per bulk-write call:
//!
//! ```text
//! OrgRoot
//! └── ChildResourceReference (Org)
//!     └── ChildResourceReference (Project)
//!         └── ChildResourceReference (Vpc)
//!             └── ChildResourceReference (VpcSubnet)
//!                 └── ChildSubnetConnectionBindingMap
//! ```
//!
//! Flat binding collections are grouped in a single pass into nested ordered
//! maps keyed on the four path segments, then wrapped bottom-up. Pagination
//! splits the grouped, ordered leaves into pages of at most `max_children`
//! leaves. A page with `n` leaves cannot have any node with more than `n`
//! children, so every node of every page respects the cap.
//!
//! [`commit_pages`] sends pages strictly in order and reports each confirmed
//! page to a caller-supplied callback, so a failure on a later page leaves the
//! effects of earlier pages visible to the caller.

use crate::backend::{BackendBinding, BackendClient, SubnetPath};
use crate::binding_errors::BackendError;
use crate::metrics;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Kind of the object a [`TreeNode::ChildResourceReference`] points at.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum TargetType {
    Org,
    Project,
    Vpc,
    VpcSubnet,
}

/// One node of a bulk-write payload.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "resource_type")]
pub enum TreeNode {
    /// Root of every bulk-write call
    OrgRoot { children: Vec<TreeNode> },

    /// Reference to an existing org, project, vpc or subnet
    ChildResourceReference {
        id: String,
        target_type: TargetType,
        children: Vec<TreeNode>,
    },

    /// A binding leaf
    ChildSubnetConnectionBindingMap {
        #[serde(rename = "SubnetConnectionBindingMap")]
        binding: BackendBinding,
        #[serde(default)]
        marked_for_delete: bool,
    },
}

impl TreeNode {
    fn reference(id: String, target_type: TargetType, children: Vec<TreeNode>) -> Self {
        TreeNode::ChildResourceReference {
            id,
            target_type,
            children,
        }
    }

    fn leaf(binding: BackendBinding) -> Self {
        let marked_for_delete = binding.marked_for_delete;
        TreeNode::ChildSubnetConnectionBindingMap {
            binding,
            marked_for_delete,
        }
    }

    /// Direct children of this node.
    #[must_use]
    pub fn children(&self) -> &[TreeNode] {
        match self {
            TreeNode::OrgRoot { children } | TreeNode::ChildResourceReference { children, .. } => {
                children.as_slice()
            }
            TreeNode::ChildSubnetConnectionBindingMap { .. } => &[],
        }
    }

    /// Number of binding leaves under this node.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        match self {
            TreeNode::ChildSubnetConnectionBindingMap { .. } => 1,
            _ => self.children().iter().map(TreeNode::leaf_count).sum(),
        }
    }

    /// Largest number of direct children found on any node of this tree.
    #[must_use]
    pub fn max_fan_out(&self) -> usize {
        let children = self.children();
        children
            .iter()
            .map(TreeNode::max_fan_out)
            .max()
            .unwrap_or(0)
            .max(children.len())
    }
}

/// Bindings grouped by org, project, vpc and subnet id.
pub type SubnetGroups =
    BTreeMap<String, BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<BackendBinding>>>>>;

/// One bulk-write call and the bindings it carries.
#[derive(Clone, Debug)]
pub struct Page {
    pub objects: Vec<BackendBinding>,
    pub tree: TreeNode,
}

/// Group bindings by the subnet they live under.
///
/// # Errors
///
/// Returns [`BackendError::InvalidPath`] if a binding's hierarchy path does not
/// follow the org/project/vpc/subnet layout.
pub fn group_by_subnet(
    objects: impl IntoIterator<Item = BackendBinding>,
) -> Result<SubnetGroups, BackendError> {
    let mut groups = SubnetGroups::new();
    for binding in objects {
        let SubnetPath {
            org,
            project,
            vpc,
            subnet,
        } = SubnetPath::parse(&binding.hierarchy_path())?;
        groups
            .entry(org)
            .or_default()
            .entry(project)
            .or_default()
            .entry(vpc)
            .or_default()
            .entry(subnet)
            .or_default()
            .push(binding);
    }
    Ok(groups)
}

fn wrap_groups(groups: SubnetGroups) -> TreeNode {
    let orgs = groups
        .into_iter()
        .map(|(org, projects)| {
            let projects = projects
                .into_iter()
                .map(|(project, vpcs)| {
                    let vpcs = vpcs
                        .into_iter()
                        .map(|(vpc, subnets)| {
                            let subnets = subnets
                                .into_iter()
                                .map(|(subnet, bindings)| {
                                    let leaves = bindings.into_iter().map(TreeNode::leaf).collect();
                                    TreeNode::reference(subnet, TargetType::VpcSubnet, leaves)
                                })
                                .collect();
                            TreeNode::reference(vpc, TargetType::Vpc, subnets)
                        })
                        .collect();
                    TreeNode::reference(project, TargetType::Project, vpcs)
                })
                .collect();
            TreeNode::reference(org, TargetType::Org, projects)
        })
        .collect();

    TreeNode::OrgRoot { children: orgs }
}

/// Build one tree carrying every binding in `objects`.
///
/// No fan-out cap is applied; see [`paginate`].
///
/// # Errors
///
/// Returns [`BackendError::InvalidPath`] on a malformed hierarchy path.
pub fn build_tree(
    objects: impl IntoIterator<Item = BackendBinding>,
) -> Result<TreeNode, BackendError> {
    Ok(wrap_groups(group_by_subnet(objects)?))
}

/// Split `objects` into bulk-write pages of at most `max_children` leaves.
///
/// Leaves are taken in group order so bindings sharing a subnet stay together
/// whenever they fit in one page. A `max_children` of zero is treated as one.
///
/// # Errors
///
/// Returns [`BackendError::InvalidPath`] on a malformed hierarchy path.
pub fn paginate(
    objects: impl IntoIterator<Item = BackendBinding>,
    max_children: usize,
) -> Result<Vec<Page>, BackendError> {
    let max_children = max_children.max(1);
    let ordered: Vec<BackendBinding> = group_by_subnet(objects)?
        .into_values()
        .flat_map(BTreeMap::into_values)
        .flat_map(BTreeMap::into_values)
        .flat_map(BTreeMap::into_values)
        .flatten()
        .collect();

    ordered
        .chunks(max_children)
        .map(|chunk| {
            Ok(Page {
                tree: build_tree(chunk.iter().cloned())?,
                objects: chunk.to_vec(),
            })
        })
        .collect()
}

/// Collect every binding leaf of `tree`, in tree order.
#[must_use]
pub fn flatten_tree(tree: &TreeNode) -> Vec<BackendBinding> {
    let mut out = Vec::with_capacity(tree.leaf_count());
    collect_leaves(tree, &mut out);
    out
}

fn collect_leaves(node: &TreeNode, out: &mut Vec<BackendBinding>) {
    match node {
        TreeNode::ChildSubnetConnectionBindingMap {
            binding,
            marked_for_delete,
        } => {
            let mut binding = binding.clone();
            binding.marked_for_delete = *marked_for_delete;
            out.push(binding);
        }
        _ => {
            for child in node.children() {
                collect_leaves(child, out);
            }
        }
    }
}

/// Commit `objects` page by page.
///
/// Pages are sent one at a time; `on_committed` runs after each page the
/// backend confirmed, with exactly that page's bindings. The cancellation token
/// is checked between pages only, so a page already in flight always finishes.
///
/// Returns the number of committed pages.
///
/// # Errors
///
/// Returns the first backend error unchanged (including a stale revision), or
/// [`BackendError::Cancelled`] when the token fired before all pages were sent.
pub async fn commit_pages<F>(
    client: &dyn BackendClient,
    objects: Vec<BackendBinding>,
    max_children: usize,
    token: &CancellationToken,
    mut on_committed: F,
) -> Result<usize, BackendError>
where
    F: FnMut(&[BackendBinding]),
{
    if objects.is_empty() {
        return Ok(0);
    }

    let pages = paginate(objects, max_children)?;
    let total = pages.len();
    debug!(pages = total, max_children = max_children, "Committing bulk-write pages");

    for (index, page) in pages.into_iter().enumerate() {
        if token.is_cancelled() {
            warn!(
                committed = index,
                remaining = total - index,
                "Commit cancelled between pages"
            );
            return Err(BackendError::Cancelled { committed: index });
        }

        if let Err(e) = client.bulk_write(&page.tree).await {
            metrics::record_backend_page(false);
            warn!(
                page = index + 1,
                pages = total,
                error = %e,
                "Bulk-write page failed"
            );
            return Err(e);
        }

        metrics::record_backend_page(true);
        on_committed(&page.objects);
    }

    if total > 1 {
        info!(pages = total, "All bulk-write pages committed");
    }
    Ok(total)
}

#[cfg(test)]
#[path = "hierarchy_tests.rs"]
mod hierarchy_tests;

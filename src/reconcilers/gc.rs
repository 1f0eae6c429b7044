// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Garbage collection of backend bindings whose binding request is gone.
//!
//! Deletions normally flow through the finalizer. The collector is the
//! backstop for requests removed while the operator was down, or whose
//! finalizer was stripped by hand.
//!
//! A pass compares the owner UIDs recorded in the local store with the UIDs of
//! live binding requests and deletes the bindings of every owner that is no
//! longer live. If the live listing fails the pass is aborted before anything
//! is deleted.
//!
//! The store's owners are read before the live listing. An owner whose
//! bindings reach the store after that read is left for the next pass.

use crate::binding_errors::ReconcileError;
use crate::context::Context;
use crate::metrics;
use crate::store::{BindingIndex, OwnerIdentity};
use tracing::{debug, info, warn};

/// Result of one collection pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GcReport {
    /// Owners present in the store with no live binding request
    pub orphaned_owners: Vec<OwnerIdentity>,
    /// Backend bindings deleted and evicted from the store
    pub deleted: usize,
}

/// Run one garbage collection pass.
///
/// # Errors
///
/// Returns [`ReconcileError::LiveListing`] without deleting anything when the
/// live binding requests cannot be listed, or [`ReconcileError::BackendWrite`]
/// when the delete commit fails. Pages committed before a failure stay deleted.
pub async fn collect(ctx: &Context) -> Result<GcReport, ReconcileError> {
    let owners = ctx.service.list_owner_identities();

    let live = match ctx.requests.list_live_uids().await {
        Ok(live) => live,
        Err(e) => {
            warn!(error = %e, "Failed to list live binding requests, skipping garbage collection");
            metrics::record_gc_run("aborted");
            return Err(ReconcileError::LiveListing(e));
        }
    };

    let orphaned_owners: Vec<OwnerIdentity> = owners
        .into_iter()
        .filter(|owner| !live.contains(&owner.uid))
        .collect();

    if orphaned_owners.is_empty() {
        debug!(live = live.len(), "No orphaned binding owners found");
        metrics::record_gc_run("clean");
        return Ok(GcReport::default());
    }

    let mut stale = Vec::new();
    for owner in &orphaned_owners {
        let owned = ctx
            .service
            .store()
            .get_by_index(BindingIndex::OwnerUid, &owner.uid);
        info!(
            owner = %owner,
            bindings = owned.len(),
            "Collecting bindings of deleted SubnetConnectionBindingMap"
        );
        stale.extend(owned);
    }

    match ctx.service.delete_bindings(stale, &ctx.shutdown).await {
        Ok(deleted) => {
            metrics::record_gc_run("collected");
            info!(
                owners = orphaned_owners.len(),
                deleted = deleted,
                "Garbage collection pass complete"
            );
            Ok(GcReport {
                orphaned_owners,
                deleted,
            })
        }
        Err(e) => {
            metrics::record_gc_run("failed");
            Err(ReconcileError::BackendWrite(e))
        }
    }
}

#[cfg(test)]
#[path = "gc_tests.rs"]
mod gc_tests;

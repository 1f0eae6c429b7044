// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `SubnetConnectionBindingMap` reconciliation.
//!
//! Each event runs one pass of the state machine:
//!
//! - **Absent** (fetch returned nothing) or being deleted: remove every
//!   backend binding owned by the request, then release the finalizer.
//! - **Unready, permanent**: write `Ready=False`, remove bindings that can no
//!   longer be realized, and wait for a watch event on the dependency.
//! - **Unready, retryable**: write `Ready=False` and requeue after a fixed delay.
//! - **Ready**: build, diff and commit the bindings, then write `Ready=True`.
//!
//! Backend and status failures are returned as errors and retried by the
//! controller's error policy.

use crate::binding_errors::ReconcileError;
use crate::constants::{
    BINDING_FINALIZER, ERROR_REQUEUE_DURATION_SECS, KIND_SUBNET_CONNECTION_BINDING_MAP,
    RETRYABLE_REQUEUE_SECS,
};
use crate::context::Context;
use crate::crd::SubnetConnectionBindingMap;
use crate::metrics;
use crate::reconcilers::finalizers::has_finalizer;
use crate::reconcilers::status::BindingStatusUpdater;
use crate::reconcilers::validation::validate;
use crate::status_reasons::REASON_BINDINGS_REALIZED;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Terminal decision of one reconciliation pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Bindings are realized and status is `Ready=True`
    Ready,
    /// A permanent dependency failure; only a watch event re-triggers
    AwaitDependency,
    /// A retryable dependency failure; try again after the delay
    RequeueAfter(Duration),
    /// The request is gone and its bindings were removed
    Removed,
}

impl ReconcileOutcome {
    /// Label used for the reconciliation metrics.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ReconcileOutcome::Ready => "ready",
            ReconcileOutcome::AwaitDependency => "await_dependency",
            ReconcileOutcome::RequeueAfter(_) => "requeue",
            ReconcileOutcome::Removed => "removed",
        }
    }
}

impl From<ReconcileOutcome> for Action {
    fn from(outcome: ReconcileOutcome) -> Self {
        match outcome {
            ReconcileOutcome::RequeueAfter(delay) => Action::requeue(delay),
            ReconcileOutcome::Ready
            | ReconcileOutcome::AwaitDependency
            | ReconcileOutcome::Removed => Action::await_change(),
        }
    }
}

async fn write_status(
    ctx: &Context,
    status: &BindingStatusUpdater,
    namespace: &str,
    name: &str,
) -> Result<(), ReconcileError> {
    status
        .apply(ctx.requests.as_ref())
        .await
        .map(|_| ())
        .map_err(|source| ReconcileError::StatusWrite {
            namespace: namespace.to_string(),
            name: name.to_string(),
            source,
        })
}

async fn remove_owned_bindings(
    ctx: &Context,
    namespace: &str,
    name: &str,
) -> Result<usize, ReconcileError> {
    ctx.service
        .delete_by_owner(namespace, name, &ctx.shutdown)
        .await
        .map_err(ReconcileError::BackendWrite)
}

async fn finalize(
    ctx: &Context,
    request: &SubnetConnectionBindingMap,
    namespace: &str,
    name: &str,
) -> Result<ReconcileOutcome, ReconcileError> {
    info!("SubnetConnectionBindingMap {namespace}/{name} is being deleted");
    let deleted = remove_owned_bindings(ctx, namespace, name).await?;
    ctx.requests
        .remove_finalizer(request)
        .await
        .map_err(|source| ReconcileError::Finalizer {
            namespace: namespace.to_string(),
            name: name.to_string(),
            source,
        })?;
    info!(deleted = deleted, "Finalized SubnetConnectionBindingMap {namespace}/{name}");
    Ok(ReconcileOutcome::Removed)
}

/// Run one reconciliation pass for `namespace/name`.
///
/// # Errors
///
/// Returns an error when the request cannot be fetched, the backend rejects a
/// write, or the status or finalizer cannot be updated.
pub async fn reconcile_binding_request(
    ctx: &Context,
    namespace: &str,
    name: &str,
) -> Result<ReconcileOutcome, ReconcileError> {
    let fetched = ctx
        .requests
        .get(namespace, name)
        .await
        .map_err(|source| ReconcileError::Fetch {
            namespace: namespace.to_string(),
            name: name.to_string(),
            source,
        })?;

    let Some(request) = fetched else {
        debug!("SubnetConnectionBindingMap {namespace}/{name} not found, removing its bindings");
        let deleted = remove_owned_bindings(ctx, namespace, name).await?;
        if deleted > 0 {
            info!(deleted = deleted, "Removed bindings of deleted SubnetConnectionBindingMap {namespace}/{name}");
        }
        return Ok(ReconcileOutcome::Removed);
    };

    if request.metadata.deletion_timestamp.is_some() {
        return finalize(ctx, &request, namespace, name).await;
    }

    if !has_finalizer(&request, BINDING_FINALIZER) {
        ctx.requests
            .ensure_finalizer(&request)
            .await
            .map_err(|source| ReconcileError::Finalizer {
                namespace: namespace.to_string(),
                name: name.to_string(),
                source,
            })?;
    }

    let mut status = BindingStatusUpdater::new(&request);

    let resolved = match validate(&request, ctx.resolver.as_ref(), ctx.service.store()).await {
        Ok(resolved) => resolved,
        Err(dependency) => {
            warn!(
                request = %request.namespaced_name(),
                reason = dependency.reason(),
                retryable = dependency.is_retryable(),
                error = %dependency,
                "Binding request dependencies not ready"
            );
            status.set_unready(dependency.reason(), &dependency.message);
            write_status(ctx, &status, namespace, name).await?;

            if dependency.is_retryable() {
                return Ok(ReconcileOutcome::RequeueAfter(Duration::from_secs(
                    RETRYABLE_REQUEUE_SECS,
                )));
            }
            remove_owned_bindings(ctx, namespace, name).await?;
            return Ok(ReconcileOutcome::AwaitDependency);
        }
    };

    match ctx
        .service
        .create_or_update(
            &request,
            &resolved.child_subnet_path,
            &resolved.target_subnet_paths,
            &ctx.shutdown,
        )
        .await
    {
        Ok(bindings) => {
            status.set_ready(
                REASON_BINDINGS_REALIZED,
                &format!("{} subnet connection binding(s) realized", bindings.len()),
            );
            write_status(ctx, &status, namespace, name).await?;
            Ok(ReconcileOutcome::Ready)
        }
        Err(err) => {
            warn!(
                request = %request.namespaced_name(),
                reason = err.reason(),
                error = %err,
                "Failed to realize backend bindings"
            );
            status.set_unready(err.reason(), &err.status_message());
            if let Err(status_err) = write_status(ctx, &status, namespace, name).await {
                warn!(error = %status_err, "Failed to record backend failure in status");
            }
            Err(err)
        }
    }
}

/// Controller entry point for binding requests.
///
/// # Errors
///
/// Propagates [`reconcile_binding_request`] errors to the error policy.
pub async fn reconcile_binding(
    request: Arc<SubnetConnectionBindingMap>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let namespace = request.namespace().unwrap_or_default();
    let name = request.name_any();
    let start = Instant::now();

    match reconcile_binding_request(&ctx, &namespace, &name).await {
        Ok(outcome) => {
            metrics::record_reconciliation(outcome.label(), start.elapsed());
            if let ReconcileOutcome::RequeueAfter(_) = outcome {
                metrics::record_requeue("retryable_dependency");
            }
            debug!(
                request = %format!("{namespace}/{name}"),
                outcome = outcome.label(),
                "Reconciled {}",
                KIND_SUBNET_CONNECTION_BINDING_MAP
            );
            Ok(outcome.into())
        }
        Err(e) => {
            metrics::record_reconciliation("error", start.elapsed());
            metrics::record_error(e.metric_label());
            error!("Failed to reconcile SubnetConnectionBindingMap {namespace}/{name}: {e}");
            Err(e)
        }
    }
}

/// Error policy: requeue with the controller's default delay.
pub fn error_policy(
    _request: Arc<SubnetConnectionBindingMap>,
    _err: &ReconcileError,
    _ctx: Arc<Context>,
) -> Action {
    metrics::record_requeue("error");
    Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
}

#[cfg(test)]
#[path = "binding_tests.rs"]
mod binding_tests;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation of `SubnetConnectionBindingMap` resources.
//!
//! The operator follows the standard Kubernetes controller pattern:
//!
//! 1. **Watch** - binding requests, plus readiness flips of the `Subnet` and
//!    `SubnetSet` resources they reference ([`watches`])
//! 2. **Validate** - resolve the child and target subnets ([`validation`])
//! 3. **Commit** - write the derived backend bindings in pages
//! 4. **Status** - report the `Ready` condition back ([`status`])
//!
//! A periodic [`gc`] pass removes bindings whose owner disappeared without
//! being finalized.
//!
//! # Example: Reconciling One Request
//!
//! ```rust,no_run
//! use subnetbind::context::Context;
//! use subnetbind::reconcilers::{reconcile_binding_request, ReconcileOutcome};
//!
//! async fn reconcile_once(ctx: &Context) -> anyhow::Result<()> {
//!     match reconcile_binding_request(ctx, "team-a", "binding1").await? {
//!         ReconcileOutcome::Ready => println!("bindings realized"),
//!         other => println!("not ready: {other:?}"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod binding;
pub mod finalizers;
pub mod gc;
pub mod pagination;
pub mod retry;
pub mod status;
pub mod validation;
pub mod watches;

pub use binding::{
    error_policy, reconcile_binding, reconcile_binding_request, ReconcileOutcome,
};
pub use gc::{collect, GcReport};
pub use validation::{validate, ResolvedDependencies};

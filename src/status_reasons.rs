// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Standard Kubernetes status condition reasons for binding requests.
//!
//! Reasons are programmatic identifiers in CamelCase that explain why the
//! `Ready` condition of a `SubnetConnectionBindingMap` has a particular status.
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   conditions:
//!     - type: Ready
//!       status: "False"
//!       reason: DependencyNotReady
//!       message: "Subnet ns1/child is not realized"
//! ```

// ============================================================================
// Condition Types and Values
// ============================================================================

/// The single condition type written by the operator.
pub const CONDITION_TYPE_READY: &str = "Ready";

/// Condition status value for a satisfied condition.
pub const CONDITION_STATUS_TRUE: &str = "True";

/// Condition status value for an unsatisfied condition.
pub const CONDITION_STATUS_FALSE: &str = "False";

// ============================================================================
// Success Reasons
// ============================================================================

/// All backend bindings for the request were written and confirmed.
pub const REASON_BINDINGS_REALIZED: &str = "BindingsRealized";

// ============================================================================
// Dependency Reasons
// ============================================================================

/// A child or parent subnet is missing or not realized yet.
///
/// Recovery depends on the watch on `Subnet`/`SubnetSet` firing when the
/// dependency becomes ready; no timed requeue is scheduled.
pub const REASON_DEPENDENCY_NOT_READY: &str = "DependencyNotReady";

/// The request sets both or neither of `targetSubnetName` and `targetSubnetSetName`.
pub const REASON_INVALID_SPEC: &str = "InvalidSpec";

/// A pre-provisioned subnet was referenced as the parent.
pub const REASON_UNSUPPORTED_TARGET: &str = "UnsupportedTarget";

/// A pre-provisioned child subnet lives in a different VPC than its parent.
pub const REASON_VPC_MISMATCH: &str = "VpcMismatch";

/// The subnet already plays the opposite role in another binding.
///
/// This is retried on a fixed 60 second timer because nesting changes on other
/// binding requests do not trigger a watch event for this one.
pub const REASON_NESTED_BINDING_CONFLICT: &str = "NestedBindingConflict";

// ============================================================================
// Backend Reasons
// ============================================================================

/// The hierarchical bulk write was rejected or did not complete.
pub const REASON_BACKEND_WRITE_FAILED: &str = "BackendWriteFailed";

/// Listing objects from the backend failed.
pub const REASON_BACKEND_LIST_FAILED: &str = "BackendListFailed";

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the subnet binding operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// Kind name for `SubnetConnectionBindingMap` resource
pub const KIND_SUBNET_CONNECTION_BINDING_MAP: &str = "SubnetConnectionBindingMap";

/// Finalizer added to binding requests so deletions are observed before the object is gone
pub const BINDING_FINALIZER: &str = "network.subnetbind.io/binding-cleanup";

/// Annotation marking a `Subnet` as pre-provisioned outside the operator.
///
/// The value has the form `<project>:<vpc>:<subnet>`.
pub const ASSOCIATED_RESOURCE_ANNOTATION: &str = "network.subnetbind.io/associated-resource";

// ============================================================================
// Backend Object Constants
// ============================================================================

/// Backend resource type of a binding object
pub const RESOURCE_TYPE_BINDING: &str = "SubnetConnectionBindingMap";

/// Path segment under a subnet holding its binding objects
pub const BINDING_PATH_SEGMENT: &str = "subnet-connection-binding-maps";

/// Tag scope carrying the cluster name
pub const TAG_SCOPE_CLUSTER: &str = "subnetbind/cluster";

/// Tag scope carrying the owner namespace
pub const TAG_SCOPE_NAMESPACE: &str = "subnetbind/namespace";

/// Tag scope carrying the owning binding request name
pub const TAG_SCOPE_OWNER_NAME: &str = "subnetbind/binding-map-name";

/// Tag scope carrying the owning binding request UID
pub const TAG_SCOPE_OWNER_UID: &str = "subnetbind/binding-map-uid";

/// Number of hex characters kept from the target path hash in binding IDs
pub const SHORT_HASH_LEN: usize = 8;

/// Maximum length of the owner-name part of a binding ID before it is truncated
pub const MAX_ID_NAME_LEN: usize = 80;

/// Default org ID used when a pre-provisioned annotation does not carry one
pub const DEFAULT_ORG_ID: &str = "default";

// ============================================================================
// Controller Requeue Constants
// ============================================================================

/// Fixed requeue delay for retryable dependency conflicts (60 seconds)
pub const RETRYABLE_REQUEUE_SECS: u64 = 60;

/// Requeue duration for controller errors (30 seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Page size used when listing Kubernetes resources
pub const KUBE_LIST_PAGE_SIZE: u32 = 100;

// ============================================================================
// Backend Bulk Write Constants
// ============================================================================

/// Default maximum number of children carried under one node of a bulk write
pub const DEFAULT_MAX_CHILDREN_PER_CALL: usize = 1000;

/// Default timeout for a single backend HTTP request (seconds)
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Garbage Collection Constants
// ============================================================================

/// Default interval between garbage collection passes (10 minutes)
pub const DEFAULT_GC_INTERVAL_SECS: u64 = 600;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Default number of binding requests reconciled concurrently
pub const DEFAULT_RECONCILE_CONCURRENCY: u16 = 8;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address for metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";

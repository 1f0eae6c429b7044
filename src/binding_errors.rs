// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for binding synchronization.
//!
//! This module provides specialized error types for:
//! - Backend API operations (bulk hierarchical writes, list-by-path, tag search)
//! - Dependency validation of a binding request (child and parent subnets)
//! - The per-event reconciliation state machine
//!
//! Dependency failures carry two channels: a short message written into the
//! `Ready` condition for operators, and a diagnostic detail for logs.

use crate::status_reasons::{
    REASON_BACKEND_LIST_FAILED, REASON_BACKEND_WRITE_FAILED, REASON_DEPENDENCY_NOT_READY,
    REASON_INVALID_SPEC, REASON_NESTED_BINDING_CONFLICT, REASON_UNSUPPORTED_TARGET,
    REASON_VPC_MISMATCH,
};
use thiserror::Error;

/// Backend error codes that never succeed on retry.
///
/// Responses carrying one of these are not retried, and the code and backend
/// message are copied into the `Ready` condition.
pub const FATAL_BACKEND_ERROR_CODES: &[i64] = &[500_012, 503_040, 610_000];

/// Errors returned by the network-policy backend or its transport.
#[derive(Error, Debug, Clone)]
pub enum BackendError {
    /// The backend answered with a non-success HTTP status
    #[error("backend request {method} {url} failed with HTTP {status}: {message}")]
    Request {
        method: String,
        url: String,
        status: u16,
        /// Backend-specific error code decoded from the response body
        error_code: Option<i64>,
        message: String,
    },

    /// The request never produced an HTTP response (connect, TLS, timeout)
    #[error("backend transport error for {url}: {reason}")]
    Transport { url: String, reason: String },

    /// The response body could not be decoded
    #[error("failed to decode backend response from {url}: {reason}")]
    Decode { url: String, reason: String },

    /// A backend path did not follow the org/project/vpc/subnet layout
    #[error("invalid backend path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// The operation was cancelled before the next page was sent
    #[error("backend operation cancelled after {committed} committed page(s)")]
    Cancelled { committed: usize },
}

impl BackendError {
    /// Whether the backend rejected the write because the revision was stale.
    #[must_use]
    pub fn is_stale_revision(&self) -> bool {
        matches!(self, BackendError::Request { status: 412, .. })
    }

    /// Whether the error carries one of the recognized fatal error codes.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            BackendError::Request {
                error_code: Some(code),
                ..
            } => FATAL_BACKEND_ERROR_CODES.contains(code),
            BackendError::InvalidPath { .. } => true,
            _ => false,
        }
    }

    /// Operator-facing summary without request URLs or transport detail.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            BackendError::Request {
                error_code: Some(code),
                message,
                ..
            } if FATAL_BACKEND_ERROR_CODES.contains(code) => {
                format!("backend error {code}: {message}")
            }
            BackendError::Request { status: 412, .. } => {
                "binding was modified on the backend concurrently".to_string()
            }
            BackendError::Request { status, .. } => format!("backend returned HTTP {status}"),
            BackendError::Transport { .. } => "backend is unreachable".to_string(),
            BackendError::Decode { .. } => "backend returned an unreadable response".to_string(),
            BackendError::InvalidPath { path, .. } => format!("invalid backend path {path}"),
            BackendError::Cancelled { .. } => "interrupted by operator shutdown".to_string(),
        }
    }
}

/// A backend binding whose tags do not identify its owning binding request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("backend binding {id} is missing owner tag {scope}")]
pub struct MissingOwnerTag {
    pub id: String,
    pub scope: &'static str,
}

/// Classification of a dependency validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyErrorKind {
    /// The binding request is not usable as written
    InvalidSpec,
    /// A referenced subnet or subnet set could not be fetched
    ResourceNotFound,
    /// A referenced subnet exists but has not been realized on the backend
    DependencyUnready,
    /// A pre-provisioned subnet was used as a connection target
    PreProvisionedTargetRejected,
    /// A pre-provisioned child subnet lives in a different VPC than its targets
    CrossDomainMismatch,
    /// The subnet already participates in another binding with the opposite role
    NestedBindingConflict,
}

impl DependencyErrorKind {
    /// Retryable failures get a fixed timed requeue; the rest wait for a watch event.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, DependencyErrorKind::NestedBindingConflict)
    }

    /// Condition reason written for this failure.
    #[must_use]
    pub fn reason(self) -> &'static str {
        match self {
            DependencyErrorKind::InvalidSpec => REASON_INVALID_SPEC,
            DependencyErrorKind::ResourceNotFound | DependencyErrorKind::DependencyUnready => {
                REASON_DEPENDENCY_NOT_READY
            }
            DependencyErrorKind::PreProvisionedTargetRejected => REASON_UNSUPPORTED_TARGET,
            DependencyErrorKind::CrossDomainMismatch => REASON_VPC_MISMATCH,
            DependencyErrorKind::NestedBindingConflict => REASON_NESTED_BINDING_CONFLICT,
        }
    }
}

/// A dependency validation failure.
///
/// `message` is written into the status condition; `detail` goes to the logs.
#[derive(Error, Debug, Clone)]
#[error("{detail}")]
pub struct DependencyError {
    pub kind: DependencyErrorKind,
    pub message: String,
    pub detail: String,
}

impl DependencyError {
    pub fn new(
        kind: DependencyErrorKind,
        message: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    #[must_use]
    pub fn reason(&self) -> &'static str {
        self.kind.reason()
    }
}

/// Errors that end a reconciliation with the controller's default backoff.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Reading the binding request from the API server failed (not a 404)
    #[error("failed to fetch {namespace}/{name}: {source}")]
    Fetch {
        namespace: String,
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// Writing the binding request status failed
    #[error("failed to update status of {namespace}/{name}: {source}")]
    StatusWrite {
        namespace: String,
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// Adding or removing the cleanup finalizer failed
    #[error("failed to manage finalizer on {namespace}/{name}: {source}")]
    Finalizer {
        namespace: String,
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// A bulk write to the backend failed
    #[error("backend write failed: {0}")]
    BackendWrite(#[source] BackendError),

    /// Listing objects from the backend failed
    #[error("backend list failed: {0}")]
    BackendList(#[source] BackendError),

    /// Listing live binding requests failed; garbage collection aborted
    #[error("failed to list live binding requests: {0}")]
    LiveListing(#[source] anyhow::Error),
}

impl ReconcileError {
    /// Condition reason used when this error is reflected in status.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            ReconcileError::BackendList(_) => REASON_BACKEND_LIST_FAILED,
            _ => REASON_BACKEND_WRITE_FAILED,
        }
    }

    /// Message written into the `Ready` condition. Diagnostic detail stays in the logs.
    #[must_use]
    pub fn status_message(&self) -> String {
        match self {
            ReconcileError::BackendWrite(e) => {
                format!("Failed to write subnet connection bindings: {}", e.summary())
            }
            ReconcileError::BackendList(e) => {
                format!("Failed to read back subnet connection bindings: {}", e.summary())
            }
            other => other.to_string(),
        }
    }

    /// Short label used for the error metrics.
    #[must_use]
    pub fn metric_label(&self) -> &'static str {
        match self {
            ReconcileError::Fetch { .. } => "fetch_error",
            ReconcileError::StatusWrite { .. } => "status_write_error",
            ReconcileError::Finalizer { .. } => "finalizer_error",
            ReconcileError::BackendWrite(_) => "backend_write_error",
            ReconcileError::BackendList(_) => "backend_list_error",
            ReconcileError::LiveListing(_) => "live_listing_error",
        }
    }
}

#[cfg(test)]
#[path = "binding_errors_tests.rs"]
mod binding_errors_tests;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers for binding requests.
//!
//! Conditions follow the standard Kubernetes format:
//! - `type`: The aspect of the resource being reported (always `Ready` here)
//! - `status`: "True", "False", or "Unknown"
//! - `reason`: A programmatic identifier (CamelCase)
//! - `message`: A human-readable explanation
//! - `lastTransitionTime`: RFC3339 timestamp of the last status flip
//!
//! # Example
//!
//! ```rust,no_run
//! use subnetbind::reconcilers::status::create_condition;
//!
//! let condition = create_condition(
//!     "Ready",
//!     "False",
//!     "DependencyNotReady",
//!     "Subnet CR child is not realized"
//! );
//! ```

use crate::crd::{Condition, SubnetConnectionBindingMap, SubnetConnectionBindingMapStatus};
use crate::requests::BindingRequestClient;
use crate::status_reasons::{CONDITION_STATUS_FALSE, CONDITION_STATUS_TRUE, CONDITION_TYPE_READY};
use anyhow::Result;
use chrono::Utc;
use kube::ResourceExt;
use tracing::debug;

/// Create a new condition stamped with the current time.
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Find a condition by type.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Update or add a condition in place (no API call).
///
/// The `lastTransitionTime` is preserved when the status value does not change.
pub fn update_condition_in_memory(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) {
        let last_transition_time = if existing.status == status {
            existing
                .last_transition_time
                .clone()
                .unwrap_or_else(|| Utc::now().to_rfc3339())
        } else {
            Utc::now().to_rfc3339()
        };

        existing.status = status.to_string();
        existing.reason = Some(reason.to_string());
        existing.message = Some(message.to_string());
        existing.last_transition_time = Some(last_transition_time);
    } else {
        conditions.push(create_condition(condition_type, status, reason, message));
    }
}

/// Whether two condition lists carry the same type, status, reason and message.
///
/// Transition times are ignored.
#[must_use]
pub fn conditions_equal(current: &[Condition], new: &[Condition]) -> bool {
    current.len() == new.len()
        && new.iter().all(|new_cond| {
            find_condition(current, &new_cond.r#type).is_some_and(|curr| {
                curr.status == new_cond.status
                    && curr.reason == new_cond.reason
                    && curr.message == new_cond.message
            })
        })
}

/// Collects the `Ready` condition for one binding request and writes it only
/// when it differs from what the API server already holds.
pub struct BindingStatusUpdater {
    namespace: String,
    name: String,
    current_status: Option<SubnetConnectionBindingMapStatus>,
    new_status: SubnetConnectionBindingMapStatus,
}

impl BindingStatusUpdater {
    #[must_use]
    pub fn new(request: &SubnetConnectionBindingMap) -> Self {
        let current_status = request.status.clone();
        let new_status = current_status.clone().unwrap_or_default();

        Self {
            namespace: request.namespace().unwrap_or_default(),
            name: request.name_any(),
            current_status,
            new_status,
        }
    }

    /// Mark the request `Ready=True`.
    pub fn set_ready(&mut self, reason: &str, message: &str) {
        update_condition_in_memory(
            &mut self.new_status.conditions,
            CONDITION_TYPE_READY,
            CONDITION_STATUS_TRUE,
            reason,
            message,
        );
    }

    /// Mark the request `Ready=False`.
    pub fn set_unready(&mut self, reason: &str, message: &str) {
        update_condition_in_memory(
            &mut self.new_status.conditions,
            CONDITION_TYPE_READY,
            CONDITION_STATUS_FALSE,
            reason,
            message,
        );
    }

    #[must_use]
    pub fn has_changes(&self) -> bool {
        match &self.current_status {
            None => !self.new_status.conditions.is_empty(),
            Some(current) => !conditions_equal(&current.conditions, &self.new_status.conditions),
        }
    }

    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.new_status.conditions
    }

    /// Persist the collected status. Returns whether an API call was made.
    ///
    /// # Errors
    ///
    /// Returns an error if the status patch fails.
    pub async fn apply(&self, client: &dyn BindingRequestClient) -> Result<bool> {
        if !self.has_changes() {
            debug!(
                "SubnetConnectionBindingMap {}/{} status unchanged, skipping update",
                self.namespace, self.name
            );
            return Ok(false);
        }

        client
            .patch_status(&self.namespace, &self.name, &self.new_status)
            .await?;

        debug!(
            "Updated SubnetConnectionBindingMap {}/{} status: {} condition(s)",
            self.namespace,
            self.name,
            self.new_status.conditions.len()
        );
        Ok(true)
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operator configuration.
//!
//! Every option can be given as a command-line flag or through the matching
//! `SUBNETBIND_*` environment variable. The configuration is validated once at
//! startup, before any client is built.

use crate::backend::client::BackendAuth;
use crate::constants::{
    DEFAULT_BACKEND_TIMEOUT_SECS, DEFAULT_GC_INTERVAL_SECS, DEFAULT_MAX_CHILDREN_PER_CALL,
    DEFAULT_RECONCILE_CONCURRENCY, METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PORT,
};
use clap::Parser;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Invalid operator configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cluster name must not be empty")]
    EmptyClusterName,

    #[error("invalid backend URL '{url}': {reason}")]
    InvalidBackendUrl { url: String, reason: String },

    #[error("backend token and username/password are mutually exclusive")]
    ConflictingAuth,

    #[error("backend username and password must be set together")]
    IncompleteBasicAuth,

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

/// Command-line and environment configuration of the operator.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "subnetbind",
    version,
    about = "Synchronizes SubnetConnectionBindingMap resources into the network-policy backend"
)]
pub struct OperatorConfig {
    /// Cluster name written into the tags of every backend binding
    #[arg(long, env = "SUBNETBIND_CLUSTER_NAME")]
    pub cluster_name: String,

    /// Base URL of the network-policy backend
    #[arg(long, env = "SUBNETBIND_BACKEND_URL")]
    pub backend_url: String,

    /// Bearer token for the backend
    #[arg(long, env = "SUBNETBIND_BACKEND_TOKEN", hide_env_values = true)]
    pub backend_token: Option<String>,

    #[arg(long, env = "SUBNETBIND_BACKEND_USERNAME")]
    pub backend_username: Option<String>,

    #[arg(long, env = "SUBNETBIND_BACKEND_PASSWORD", hide_env_values = true)]
    pub backend_password: Option<String>,

    /// Timeout of one backend HTTP request, in seconds
    #[arg(long, env = "SUBNETBIND_BACKEND_TIMEOUT_SECS", default_value_t = DEFAULT_BACKEND_TIMEOUT_SECS)]
    pub backend_timeout_secs: u64,

    /// Maximum children under one node of a bulk-write payload
    #[arg(long, env = "SUBNETBIND_MAX_CHILDREN_PER_CALL", default_value_t = DEFAULT_MAX_CHILDREN_PER_CALL)]
    pub max_children_per_call: usize,

    /// Seconds between garbage collection passes
    #[arg(long, env = "SUBNETBIND_GC_INTERVAL_SECS", default_value_t = DEFAULT_GC_INTERVAL_SECS)]
    pub gc_interval_secs: u64,

    /// Binding requests reconciled concurrently
    #[arg(long, env = "SUBNETBIND_CONCURRENCY", default_value_t = DEFAULT_RECONCILE_CONCURRENCY)]
    pub concurrency: u16,

    #[arg(long, env = "SUBNETBIND_METRICS_BIND_ADDRESS", default_value = METRICS_SERVER_BIND_ADDRESS)]
    pub metrics_bind_address: String,

    #[arg(long, env = "SUBNETBIND_METRICS_PORT", default_value_t = METRICS_SERVER_PORT)]
    pub metrics_port: u16,
}

impl OperatorConfig {
    /// Check the configuration for values that would fail later at runtime.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cluster_name.trim().is_empty() {
            return Err(ConfigError::EmptyClusterName);
        }

        let url = Url::parse(&self.backend_url).map_err(|e| ConfigError::InvalidBackendUrl {
            url: self.backend_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBackendUrl {
                url: self.backend_url.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        let basic = (&self.backend_username, &self.backend_password);
        match basic {
            (Some(_), None) | (None, Some(_)) => return Err(ConfigError::IncompleteBasicAuth),
            (Some(_), Some(_)) if self.backend_token.is_some() => {
                return Err(ConfigError::ConflictingAuth)
            }
            _ => {}
        }

        for (field, value) in [
            ("max-children-per-call", self.max_children_per_call as u64),
            ("gc-interval-secs", self.gc_interval_secs),
            ("concurrency", u64::from(self.concurrency)),
            ("backend-timeout-secs", self.backend_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        Ok(())
    }

    /// Authentication to use against the backend.
    #[must_use]
    pub fn backend_auth(&self) -> BackendAuth {
        match (&self.backend_token, &self.backend_username, &self.backend_password) {
            (Some(token), _, _) => BackendAuth::Bearer(token.clone()),
            (None, Some(username), Some(password)) => BackendAuth::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            _ => BackendAuth::None,
        }
    }

    #[must_use]
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    #[must_use]
    pub fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.gc_interval_secs)
    }

    /// `address:port` the metrics server listens on.
    #[must_use]
    pub fn metrics_addr(&self) -> String {
        format!("{}:{}", self.metrics_bind_address, self.metrics_port)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;

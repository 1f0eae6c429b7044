// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # Subnetbind - Subnet Connection Binding Operator for Kubernetes
//!
//! Subnetbind watches `SubnetConnectionBindingMap` resources and keeps the
//! matching binding objects of a hierarchical network-policy backend in sync.
//! A binding attaches a child subnet to a parent (target) subnet with a VLAN
//! traffic tag.
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definitions for binding requests and subnets
//! - [`reconcilers`] - Dependency validation, the reconcile state machine and GC
//! - [`store`] - Multi-index local cache of backend bindings
//! - [`builder`] - Derivation of backend bindings from binding requests
//! - [`hierarchy`] - Nested bulk-write payloads and paginated commits
//! - [`service`] - Backend plus store façade used by the reconcilers
//! - [`backend`] - Backend object model and HTTP client
//!
//! ## Example
//!
//! ```rust,no_run
//! use subnetbind::builder::binding_id;
//!
//! let id = binding_id("binding1", "/orgs/default/projects/p/vpcs/v/subnets/parent");
//! assert!(id.starts_with("binding1_"));
//! ```

pub mod backend;
pub mod binding_errors;
pub mod builder;
pub mod config;
pub mod constants;
pub mod context;
pub mod crd;
pub mod hierarchy;
pub mod metrics;
pub mod reconcilers;
pub mod requests;
pub mod resolver;
pub mod scheduler;
pub mod service;
pub mod status_reasons;
pub mod store;

#[cfg(test)]
mod status_reasons_tests;
#[cfg(test)]
mod test_support;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CRD YAML Generator
//!
//! Generates Kubernetes CRD YAML files from the Rust types in src/crd.rs.
//!
//! Usage:
//!   cargo run --bin crdgen [output-dir]
//!
//! Files are written to deploy/crds/ by default. `Subnet` and `SubnetSet` are
//! owned by the subnet operator; their CRDs are generated into `testing/` for
//! clusters that run without it.

use kube::CustomResourceExt;
use std::fs;
use std::path::{Path, PathBuf};
use subnetbind::crd::{Subnet, SubnetConnectionBindingMap, SubnetSet};

const COPYRIGHT_HEADER: &str = "# Copyright (c) 2025 Erick Bourgeois, firestoned
# SPDX-License-Identifier: MIT
#
# This file is AUTO-GENERATED from src/crd.rs
# DO NOT EDIT MANUALLY - Run `cargo run --bin crdgen` to regenerate
#
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from("deploy/crds"), PathBuf::from);
    let testing_dir = output_dir.join("testing");
    fs::create_dir_all(&testing_dir)?;

    println!("Generating CRD YAML files from src/crd.rs...");

    generate_crd::<SubnetConnectionBindingMap>(
        "subnetconnectionbindingmaps.crd.yaml",
        &output_dir,
    )?;
    generate_crd::<Subnet>("subnets.crd.yaml", &testing_dir)?;
    generate_crd::<SubnetSet>("subnetsets.crd.yaml", &testing_dir)?;

    println!(
        "✓ Successfully generated CRD YAML files in {}",
        output_dir.display()
    );
    Ok(())
}

fn generate_crd<T>(filename: &str, output_dir: &Path) -> Result<(), Box<dyn std::error::Error>>
where
    T: CustomResourceExt,
{
    let yaml = serde_yaml::to_string(&T::crd())?;
    let output_path = output_dir.join(filename);
    fs::write(&output_path, format!("{COPYRIGHT_HEADER}{yaml}"))?;

    println!("  ✓ Generated {}", output_path.display());
    Ok(())
}

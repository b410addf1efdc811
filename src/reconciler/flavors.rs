//! Bare-metal flavors.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::nodes::DEFAULT_NODE_RESOURCE_CLASS;
use crate::error::Result;
use crate::openstack::ComputeApi;
use crate::openstack::types::{ExtraSpecs, Flavor};

/// Flavors every undercloud provides, with their profile capability.
pub const FLAVORS: [(&str, Option<&str>); 6] = [
    ("baremetal", None),
    ("control", Some("control")),
    ("compute", Some("compute")),
    ("ceph-storage", Some("ceph-storage")),
    ("block-storage", Some("block-storage")),
    ("swift-storage", Some("swift-storage")),
];

/// Stock flavors that are useless on an undercloud.
pub const DEFAULT_FLAVORS: [&str; 5] = ["m1.tiny", "m1.small", "m1.medium", "m1.large", "m1.xlarge"];

/// Memory of created flavors in MB.
const FLAVOR_RAM_MB: u64 = 4096;
/// Virtual CPUs of created flavors.
const FLAVOR_VCPUS: u32 = 1;
/// Disk of created flavors in GB.
const FLAVOR_DISK_GB: u64 = 40;

/// What happened to a flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlavorOutcome {
    /// The flavor was created.
    Created,
    /// Missing scheduling keys were added.
    Updated,
    /// The flavor requests another custom resource class and was left alone.
    Skipped,
}

/// Extra spec requesting the default node resource class.
#[must_use]
pub fn resource_class_key() -> String {
    format!("resources:CUSTOM_{}", DEFAULT_NODE_RESOURCE_CLASS.to_uppercase())
}

/// Scheduling keys every managed flavor carries.
fn required_keys() -> ExtraSpecs {
    BTreeMap::from([
        (resource_class_key(), "1".to_string()),
        ("resources:DISK_GB".to_string(), "0".to_string()),
        ("resources:MEMORY_MB".to_string(), "0".to_string()),
        ("resources:VCPU".to_string(), "0".to_string()),
    ])
}

/// Deletes the stock `m1.*` flavors.
///
/// # Errors
///
/// Returns any API error.
pub async fn delete_default_flavors<C: ComputeApi + ?Sized>(compute: &C) -> Result<usize> {
    let mut deleted = 0;
    for flavor in compute.list_flavors().await? {
        if DEFAULT_FLAVORS.contains(&flavor.name.as_str()) {
            compute.delete_flavor(&flavor.id).await?;
            deleted += 1;
        }
    }
    Ok(deleted)
}

/// Creates a flavor or brings an existing one's scheduling keys up to date.
///
/// Existing values always win over the required keys. A flavor already
/// requesting a different custom resource class is skipped.
///
/// # Errors
///
/// Returns any API error.
pub async fn ensure_flavor<C: ComputeApi + ?Sized>(
    compute: &C,
    existing: Option<&Flavor>,
    name: &str,
    profile: Option<&str>,
) -> Result<FlavorOutcome> {
    let rc_key = resource_class_key();
    let mut keys = required_keys();

    let Some(existing) = existing else {
        let flavor = compute
            .create_flavor(name, FLAVOR_RAM_MB, FLAVOR_VCPUS, FLAVOR_DISK_GB)
            .await?;
        keys.insert("capabilities:boot_option".to_string(), "local".to_string());
        if let Some(profile) = profile {
            keys.insert("capabilities:profile".to_string(), profile.to_string());
        }
        compute.set_flavor_keys(&flavor.id, &keys).await?;
        info!("Created flavor \"{name}\" with profile \"{}\"", profile.unwrap_or("None"));
        return Ok(FlavorOutcome::Created);
    };

    info!("Not creating flavor \"{name}\" because it already exists.");
    let old_keys = compute.get_flavor_keys(&existing.id).await?;
    if let Some(custom) = old_keys
        .keys()
        .find(|key| key.starts_with("resources:CUSTOM_") && **key != rc_key)
    {
        warn!(
            "Not updating flavor {}, as it already has a custom resource class {custom}. \
             Make sure you have enough nodes with this resource class.",
            existing.name
        );
        return Ok(FlavorOutcome::Skipped);
    }

    keys.extend(old_keys);
    compute.set_flavor_keys(&existing.id, &keys).await?;
    info!("Flavor {name} updated to use custom resource class {DEFAULT_NODE_RESOURCE_CLASS}");
    Ok(FlavorOutcome::Updated)
}

/// Ensures all managed flavors.
///
/// # Errors
///
/// Returns any API error.
pub async fn ensure_flavors<C: ComputeApi + ?Sized>(
    compute: &C,
) -> Result<Vec<(&'static str, FlavorOutcome)>> {
    let existing: BTreeMap<String, Flavor> = compute
        .list_flavors()
        .await?
        .into_iter()
        .map(|flavor| (flavor.name.clone(), flavor))
        .collect();

    let mut outcomes = Vec::with_capacity(FLAVORS.len());
    for (name, profile) in FLAVORS {
        let outcome = ensure_flavor(compute, existing.get(name), name, profile).await?;
        outcomes.push((name, outcome));
    }
    Ok(outcomes)
}

//! Facts collected from the running host.

use std::path::Path;
use sysinfo::{Networks, System};
use tracing::debug;

use crate::config::Paths;
use crate::error::{HostError, Result};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Host state the generator and checks depend on.
///
/// Collected once at startup; tests construct it directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFacts {
    /// Host name as reported by the kernel.
    pub hostname: String,
    /// Distribution name, e.g. `CentOS Linux`.
    pub distribution: String,
    /// Network interface names.
    pub interfaces: Vec<String>,
    /// Physical memory plus swap, in megabytes.
    pub total_memory_mb: u64,
    /// True when the kernel exposes IPv6.
    pub ipv6_enabled: bool,
    /// Invoking user.
    pub user: String,
}

impl HostFacts {
    /// Collects facts from the live system.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Inspection`] when the hostname cannot be read.
    pub fn detect(paths: &Paths) -> Result<Self> {
        let hostname = hostname::get()
            .map_err(|e| HostError::Inspection {
                message: format!("cannot read hostname: {e}"),
            })?
            .to_string_lossy()
            .into_owned();

        let mut system = System::new_all();
        system.refresh_memory();
        let total_memory_mb = (system.total_memory() + system.total_swap()) / BYTES_PER_MB;

        let networks = Networks::new_with_refreshed_list();
        let mut interfaces: Vec<String> = networks.iter().map(|(name, _)| name.clone()).collect();
        interfaces.sort();

        let distribution = std::fs::read_to_string(&paths.os_release)
            .map(|text| os_release_name(&text))
            .unwrap_or_default();

        let user = std::env::var("USER")
            .or_else(|_| std::env::var("LOGNAME"))
            .unwrap_or_default();

        let facts = Self {
            hostname,
            distribution,
            interfaces,
            total_memory_mb,
            ipv6_enabled: ipv6_enabled(&paths.proc_root),
            user,
        };
        debug!("Detected host facts: {:?}", facts);
        Ok(facts)
    }
}

/// True when `/proc/net/if_inet6` exists.
#[must_use]
pub fn ipv6_enabled(proc_root: &Path) -> bool {
    proc_root.join("net").join("if_inet6").is_file()
}

/// Extracts `NAME` from an os-release document.
#[must_use]
pub fn os_release_name(text: &str) -> String {
    text.lines()
        .filter_map(|line| line.trim().strip_prefix("NAME="))
        .map(|value| value.trim_matches('"').trim_matches('\'').to_string())
        .next()
        .unwrap_or_default()
}

//! Keys that may be written into the install environment.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use super::endpoints::endpoint_keys;
use crate::config::schema::all_options;

/// Keys the provisioning tool reads from its own environment.
pub const INSTACK_KEYS: &[&str] = &[
    "HOSTNAME",
    "ELEMENTS_PATH",
    "NODE_DIST",
    "JSONFILE",
    "REG_METHOD",
    "REG_HALT_UNREGISTER",
    "PUBLIC_INTERFACE_IP",
];

/// Keys computed during generation rather than copied from an option.
pub const DYNAMIC_KEYS: &[&str] = &[
    "INSPECTION_COLLECTORS",
    "INSPECTION_KERNEL_ARGS",
    "INSPECTION_NODE_NOT_FOUND_HOOK",
    "TRIPLEO_INSTALL_USER",
    "TRIPLEO_UNDERCLOUD_CONF_FILE",
    "TRIPLEO_UNDERCLOUD_PASSWORD_FILE",
    "ENABLED_BOOT_INTERFACES",
    "ENABLED_POWER_INTERFACES",
    "ENABLED_RAID_INTERFACES",
    "ENABLED_VENDOR_INTERFACES",
    "ENABLED_MANAGEMENT_INTERFACES",
    "SYSCTL_SETTINGS",
    "LOCAL_IP_WRAPPED",
    "ENABLE_ARCHITECTURE_PPC64LE",
    "INSPECTION_SUBNETS",
    "SUBNETS_CIDR_NAT_RULES",
    "SUBNETS_STATIC_ROUTES",
    "MASQUERADE_NETWORKS",
];

static ALLOWED: LazyLock<BTreeSet<String>> = LazyLock::new(|| {
    INSTACK_KEYS
        .iter()
        .chain(DYNAMIC_KEYS)
        .map(|key| (*key).to_string())
        .chain(endpoint_keys())
        .chain(all_options().map(|spec| spec.env_key()))
        .collect()
});

/// True when `key` may be set.
#[must_use]
pub fn is_permitted(key: &str) -> bool {
    ALLOWED.contains(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partitions_are_permitted() {
        assert!(is_permitted("HOSTNAME"));
        assert!(is_permitted("SUBNETS_STATIC_ROUTES"));
        assert!(is_permitted("UNDERCLOUD_ENDPOINT_KEYSTONE_PUBLIC"));
        assert!(is_permitted("LOCAL_IP"));
        assert!(is_permitted("UNDERCLOUD_DB_PASSWORD"));
        assert!(is_permitted("DHCP_START"));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(!is_permitted("PATH"));
        assert!(!is_permitted("local_ip"));
        assert!(!is_permitted("ENABLE_ARCHITECTURE_MIPS"));
    }
}

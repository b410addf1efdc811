//! Host inspection and precondition checks.

mod checks;
mod facts;

pub use checks::{
    REQUIRED_MB, check_hostname, check_memory, check_sysctl, hosts_contains,
    validate_no_ip_change, validate_passwords_file,
};
pub use facts::{HostFacts, ipv6_enabled, os_release_name};

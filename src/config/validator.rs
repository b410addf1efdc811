//! Configuration validation.
//!
//! The checks are plain functions that report each violation through a
//! caller-supplied callback. [`ConfigValidator`] runs them all in order and
//! either collects the violations into a [`ValidationReport`] or aborts on
//! the first one.

use ipnetwork::IpNetwork;
use std::net::IpAddr;
use tracing::{debug, error};

use super::addr::{cidr_overlaps, ip_to_int, parse_ip, parse_network};
use super::schema::SUPPORTED_ARCHITECTURES;
use super::types::{SubnetConfig, UndercloudConfig};
use crate::error::ConfigError;

/// Flattened view of the global options the network checks need, plus the
/// CIDR of the local subnet.
#[derive(Debug, Clone)]
pub struct ConfigParameters<'a> {
    /// `local_ip` with prefix.
    pub local_ip: &'a str,
    /// Forced hostname, if any.
    pub undercloud_hostname: Option<&'a str>,
    /// Public endpoint host.
    pub undercloud_public_host: &'a str,
    /// Admin endpoint host.
    pub undercloud_admin_host: &'a str,
    /// True when a certificate is configured or generated.
    pub ssl_enabled: bool,
    /// True when the UI is installed.
    pub enable_ui: bool,
    /// Provisioning interface.
    pub local_interface: &'a str,
    /// Network configuration override file.
    pub net_config_override: &'a str,
    /// Nameservers for the undercloud.
    pub undercloud_nameservers: &'a [String],
    /// CIDR of the local subnet.
    pub local_subnet_cidr: Option<&'a str>,
}

impl<'a> ConfigParameters<'a> {
    /// Builds the view from a loaded configuration.
    #[must_use]
    pub fn from_config(config: &'a UndercloudConfig) -> Self {
        Self {
            local_ip: config.local_ip(),
            undercloud_hostname: config.undercloud_hostname(),
            undercloud_public_host: config.string("undercloud_public_host"),
            undercloud_admin_host: config.string("undercloud_admin_host"),
            ssl_enabled: config.ssl_enabled(),
            enable_ui: config.flag("enable_ui"),
            local_interface: config.string("local_interface"),
            net_config_override: config.string("net_config_override"),
            undercloud_nameservers: config.list("undercloud_nameservers"),
            local_subnet_cidr: config
                .local_subnet()
                .ok()
                .and_then(|subnet| subnet.cidr.as_deref()),
        }
    }
}

/// Outcome of a full validation run.
#[derive(Debug, Default, Clone)]
pub struct ValidationReport {
    /// Violations, in the order they were found.
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// True when no violation was found.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Converts the report into a result carrying the first violation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationFailed`] when any violation was found.
    pub fn into_result(self) -> Result<(), ConfigError> {
        match self.errors.into_iter().next() {
            None => Ok(()),
            Some(message) => Err(ConfigError::validation(message)),
        }
    }
}

/// Runs every configuration check.
#[derive(Debug, Clone)]
pub struct ConfigValidator<'a> {
    interfaces: &'a [String],
}

impl<'a> ConfigValidator<'a> {
    /// Creates a validator that knows the host's network interfaces.
    #[must_use]
    pub const fn new(interfaces: &'a [String]) -> Self {
        Self { interfaces }
    }

    /// Runs all checks, reporting each violation to `on_error`.
    pub fn run(&self, config: &UndercloudConfig, on_error: &mut dyn FnMut(String)) {
        validate_routed_networks(config, on_error);
        if config.local_subnet().is_err() {
            on_error(format!(
                "local_subnet \"{}\" is not in subnets: {}",
                config.string("local_subnet"),
                config.list("subnets").join(", ")
            ));
        }

        let params = ConfigParameters::from_config(config);
        validate_config(&params, self.interfaces, on_error);
        for subnet in config.subnets() {
            validate_subnet(subnet, on_error);
        }
        validate_subnet_overlaps(config.subnets(), on_error);
        validate_architectures(
            config.list("additional_architectures"),
            config.flag("ipxe_enabled"),
            on_error,
        );
    }

    /// Collects every violation.
    #[must_use]
    pub fn validate(&self, config: &UndercloudConfig) -> ValidationReport {
        let mut report = ValidationReport::default();
        self.run(config, &mut |message| report.errors.push(message));
        if report.is_valid() {
            debug!("Configuration validation passed");
        }
        report
    }

    /// Fails on the first violation, logging every one found.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationFailed`] carrying the first violation.
    pub fn ensure_valid(&self, config: &UndercloudConfig) -> Result<(), ConfigError> {
        let report = self.validate(config);
        for message in &report.errors {
            error!("Undercloud configuration validation failed: {message}");
        }
        report.into_result()
    }
}

/// Multiple subnets require routed networks.
pub fn validate_routed_networks(config: &UndercloudConfig, on_error: &mut dyn FnMut(String)) {
    let subnets = config.list("subnets");
    if subnets.len() > 1 && !config.flag("enable_routed_networks") {
        on_error(format!(
            "Multiple subnets specified: {} but routed networks are not enabled.",
            subnets.join(", ")
        ));
    }
}

/// Checks the global options: format, containment, interface and nameservers.
pub fn validate_config(
    params: &ConfigParameters<'_>,
    interfaces: &[String],
    on_error: &mut dyn FnMut(String),
) {
    let local_ip = validate_local_ip(params.local_ip, on_error);
    if let Some(hostname) = params.undercloud_hostname {
        if !hostname.contains('.') {
            on_error(format!("Hostname \"{hostname}\" is not fully qualified."));
        }
    }

    let cidr = params
        .local_subnet_cidr
        .and_then(|cidr| parse_network(cidr).ok());
    if let (Some(cidr), Some(local_ip)) = (cidr, local_ip) {
        if !cidr.contains(local_ip) {
            on_error(format!(
                "local_ip \"{local_ip}\" not in defined CIDR \"{cidr}\""
            ));
        }
    }
    if params.ssl_enabled && !params.enable_ui {
        if let Some(cidr) = cidr {
            for (name, value) in [
                ("undercloud_public_host", params.undercloud_public_host),
                ("undercloud_admin_host", params.undercloud_admin_host),
            ] {
                check_in_cidr(&cidr, name, value, false, on_error);
            }
        }
    }

    validate_interface_exists(params, interfaces, on_error);
    for nameserver in params.undercloud_nameservers {
        if parse_ip(nameserver).is_none() {
            on_error(format!(
                "Invalid nameserver found in undercloud_nameservers: {nameserver}"
            ));
        }
    }
}

/// Parses `local_ip`, returning its address when the format is acceptable.
fn validate_local_ip(value: &str, on_error: &mut dyn FnMut(String)) -> Option<IpAddr> {
    match check_cidr_format(value) {
        Ok(network) => Some(network.ip()),
        Err(reason) => {
            on_error(format!(
                "local_ip \"{value}\" not valid: \"{reason}\" Value must be in CIDR format."
            ));
            None
        }
    }
}

/// A network is acceptable if its prefix is strictly between 0 and 32 for
/// IPv4, or exactly 64 for IPv6.
fn check_cidr_format(value: &str) -> Result<IpNetwork, String> {
    let network = parse_network(value)?;
    match network {
        IpNetwork::V4(net) if net.prefix() == 0 || net.prefix() >= 32 => {
            Err("Invalid netmask".to_string())
        }
        IpNetwork::V6(net) if net.prefix() != 64 => Err("Prefix must be 64 for IPv6.".to_string()),
        _ => Ok(network),
    }
}

fn check_in_cidr(
    cidr: &IpNetwork,
    name: &str,
    value: &str,
    require_ip: bool,
    on_error: &mut dyn FnMut(String),
) {
    match parse_ip(value) {
        Some(ip) if !cidr.contains(ip) => {
            on_error(format!("{name} \"{value}\" not in defined CIDR \"{cidr}\""));
        }
        Some(_) => {}
        None if require_ip => on_error(format!("Invalid IP address: {value}")),
        None => {}
    }
}

fn validate_interface_exists(
    params: &ConfigParameters<'_>,
    interfaces: &[String],
    on_error: &mut dyn FnMut(String),
) {
    if !params.net_config_override.is_empty() {
        return;
    }
    if !interfaces.iter().any(|iface| iface == params.local_interface) {
        on_error(format!(
            "Invalid local_interface specified. {} is not available.",
            params.local_interface
        ));
    }
}

/// Checks one subnet: presence, format, containment, ordering and overlap.
pub fn validate_subnet(subnet: &SubnetConfig, on_error: &mut dyn FnMut(String)) {
    let missing = subnet.missing_options();
    if !missing.is_empty() {
        on_error(format!(
            "subnet \"{}\" is missing option(s): {}",
            subnet.name,
            missing.join(", ")
        ));
        return;
    }

    let cidr = match check_cidr_format(subnet.cidr_str()) {
        Ok(cidr) => cidr,
        Err(reason) => {
            on_error(format!(
                "cidr \"{}\" of subnet {} not valid: \"{reason}\" Value must be in CIDR format.",
                subnet.cidr_str(),
                subnet.name
            ));
            return;
        }
    };

    let Some((inspection_start, inspection_end)) = subnet.inspection_range() else {
        on_error(format!(
            "inspection_iprange \"{}\" of subnet {} must be two comma separated addresses",
            subnet.inspection_iprange.as_deref().unwrap_or_default(),
            subnet.name
        ));
        return;
    };
    let dhcp_start = subnet.dhcp_start.as_deref().unwrap_or_default();
    let dhcp_end = subnet.dhcp_end.as_deref().unwrap_or_default();

    for (name, value) in [
        ("gateway", subnet.gateway_str()),
        ("dhcp_start", dhcp_start),
        ("dhcp_end", dhcp_end),
        ("Inspection range start", inspection_start),
        ("Inspection range end", inspection_end),
    ] {
        check_in_cidr(&cidr, name, value, true, on_error);
    }

    let (Some(ds), Some(de), Some(is), Some(ie)) = (
        parse_ip(dhcp_start).map(ip_to_int),
        parse_ip(dhcp_end).map(ip_to_int),
        parse_ip(inspection_start).map(ip_to_int),
        parse_ip(inspection_end).map(ip_to_int),
    ) else {
        return;
    };

    if ds >= de {
        on_error(format!(
            "Invalid dhcp range specified, dhcp_start \"{dhcp_start}\" does not come before \
             dhcp_end \"{dhcp_end}\""
        ));
    }
    if is >= ie {
        on_error(format!(
            "Invalid inspection range specified, inspection_iprange \"{inspection_start}\" \
             does not come before \"{inspection_end}\""
        ));
    }
    if ds <= ie && is <= de {
        on_error(format!(
            "Inspection DHCP range \"{inspection_start}-{inspection_end}\" overlaps \
             provisioning DHCP range \"{dhcp_start}-{dhcp_end}\"."
        ));
    }
}

/// Pairwise CIDR overlap across subnets.
pub fn validate_subnet_overlaps(subnets: &[SubnetConfig], on_error: &mut dyn FnMut(String)) {
    let parsed: Vec<(&SubnetConfig, IpNetwork)> = subnets
        .iter()
        .filter_map(|subnet| Some((subnet, parse_network(subnet.cidr.as_deref()?).ok()?)))
        .collect();
    for (index, (first, first_cidr)) in parsed.iter().enumerate() {
        for (second, second_cidr) in &parsed[index + 1..] {
            if cidr_overlaps(first_cidr, second_cidr) {
                on_error(format!(
                    "CIDR of {}, {}, overlaps with CIDR of {}, {}.",
                    first.name,
                    first.cidr_str(),
                    second.name,
                    second.cidr_str()
                ));
            }
        }
    }
}

/// Supported additional architectures and their exclusive options.
pub fn validate_architectures(
    architectures: &[String],
    ipxe_enabled: bool,
    on_error: &mut dyn FnMut(String),
) {
    for arch in architectures {
        if !SUPPORTED_ARCHITECTURES.contains(&arch.as_str()) {
            on_error(format!(
                "additional_architectures \"{arch}\" must be a supported architecture: {}",
                SUPPORTED_ARCHITECTURES.join(" ")
            ));
        }
    }
    if architectures.iter().any(|arch| arch == "ppc64le") && ipxe_enabled {
        on_error(
            "Currently iPXE boot isn't supported with ppc64le systems but is enabled".to_string(),
        );
    }
}

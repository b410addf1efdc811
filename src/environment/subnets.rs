//! Values derived from the subnet groups.

use serde::Serialize;

use super::Environment;
use crate::config::UndercloudConfig;
use crate::config::addr::parse_network;
use crate::error::{ConfigError, EnvironmentError, Result};

/// One entry of `INSPECTION_SUBNETS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectionSubnet {
    /// Subnet name.
    pub tag: String,
    /// Inspection range as `start,end`.
    pub ip_range: String,
    /// Dotted netmask (or IPv6 mask) of the subnet CIDR.
    pub netmask: String,
    /// Subnet gateway.
    pub gateway: String,
}

/// One entry of `SUBNETS_STATIC_ROUTES`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaticRoute {
    /// Destination CIDR.
    pub ip_netmask: String,
    /// Gateway of the local subnet.
    pub next_hop: String,
}

/// Inspection DHCP ranges of every subnet.
///
/// # Errors
///
/// Returns an error when a subnet CIDR does not parse.
pub fn inspection_subnets(config: &UndercloudConfig) -> Result<Vec<InspectionSubnet>> {
    config
        .subnets()
        .iter()
        .map(|subnet| {
            let network = parse_network(subnet.cidr_str()).map_err(|message| {
                ConfigError::InvalidValue {
                    option: format!("{}.cidr", subnet.name),
                    value: subnet.cidr_str().to_string(),
                    message,
                }
            })?;
            Ok(InspectionSubnet {
                tag: subnet.name.clone(),
                ip_range: subnet.inspection_iprange.clone().unwrap_or_default(),
                netmask: network.mask().to_string(),
                gateway: subnet.gateway_str().to_string(),
            })
        })
        .collect()
}

/// Routes to every remote subnet through the local subnet's gateway.
///
/// # Errors
///
/// Returns [`ConfigError::MissingSubnetGroup`] when the local subnet is not
/// configured.
pub fn static_routes(config: &UndercloudConfig) -> Result<Vec<StaticRoute>> {
    let local = config.local_subnet()?;
    Ok(config
        .subnets()
        .iter()
        .filter(|subnet| subnet.name != local.name)
        .map(|subnet| StaticRoute {
            ip_netmask: subnet.cidr_str().to_string(),
            next_hop: local.gateway_str().to_string(),
        })
        .collect())
}

/// Firewall rule fragments accepting forwarded traffic for every subnet.
///
/// Fragments are joined with a newline plus two spaces so they line up in
/// the templated hieradata.
#[must_use]
pub fn cidr_nat_rules(config: &UndercloudConfig) -> String {
    let mut rules = Vec::with_capacity(config.subnets().len() * 2);
    for subnet in config.subnets() {
        for direction in ["destination", "source"] {
            rules.push(format!(
                "\"140 {direction} {name} cidr nat\": {{\"chain\": \"FORWARD\", \
                 \"{direction}\": \"{cidr}\", \"proto\": \"all\", \"action\": \"accept\"}}",
                name = subnet.name,
                cidr = subnet.cidr_str(),
            ));
        }
    }
    rules.join("\n  ")
}

/// CIDRs to masquerade, including the deprecated `masquerade_network`.
#[must_use]
pub fn masquerade_networks(config: &UndercloudConfig) -> Vec<String> {
    let mut networks: Vec<String> = config
        .subnets()
        .iter()
        .filter(|subnet| subnet.masquerade)
        .map(|subnet| subnet.cidr_str().to_string())
        .collect();
    if let Some(legacy) = config.optional_string("masquerade_network") {
        if !networks.iter().any(|network| network == legacy) {
            networks.push(legacy.to_string());
        }
    }
    networks
}

/// Serializes a value to JSON and stores it under `key`.
pub(crate) fn set_json<T: Serialize + ?Sized>(env: &mut Environment, key: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string(value).map_err(|e| EnvironmentError::Serialization {
        key: key.to_string(),
        message: e.to_string(),
    })?;
    env.set(key, json)?;
    Ok(())
}

/// Writes every subnet-derived key.
///
/// # Errors
///
/// Returns an error when a subnet CIDR is invalid or the local subnet is
/// missing.
pub fn apply(env: &mut Environment, config: &UndercloudConfig) -> Result<()> {
    set_json(env, "INSPECTION_SUBNETS", &inspection_subnets(config)?)?;
    env.set("SUBNETS_CIDR_NAT_RULES", cidr_nat_rules(config))?;
    set_json(env, "MASQUERADE_NETWORKS", &masquerade_networks(config))?;
    set_json(env, "SUBNETS_STATIC_ROUTES", &static_routes(config)?)?;
    Ok(())
}

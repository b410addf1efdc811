//! Provisioning network, segments and subnets.
//!
//! The `ctlplane` network is flat on the `ctlplane` physical network. Each
//! configured subnet gets a segment named after it; the local subnet's
//! segment maps to `ctlplane`, every other one to a physical network of
//! the subnet's own name.

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::{SubnetConfig, UndercloudConfig, addr};
use crate::error::{ReconcileError, Result};
use crate::openstack::NetworkApi;
use crate::openstack::types::{AllocationPool, HostRoute, Network, Subnet, SubnetRequest, SubnetUpdate};

/// Name of the provisioning network and its physical network.
pub const PHYSICAL_NETWORK: &str = "ctlplane";

/// Destination of the metadata route pushed to DHCP clients.
const METADATA_DESTINATION: &str = "169.254.169.254/32";

/// Changes made while reconciling subnets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubnetChanges {
    /// Subnets created.
    pub created: Vec<String>,
    /// Subnets updated in place.
    pub updated: Vec<String>,
    /// Segments created.
    pub segments_created: Vec<String>,
    /// Routers created for IPv6 subnets.
    pub routers_created: Vec<String>,
}

/// Returns the `ctlplane` network, creating it when missing.
///
/// A freshly created network's default segment is deleted; segments are
/// created per subnet afterwards.
///
/// # Errors
///
/// Returns any API error.
pub async fn ensure_network<N: NetworkApi + ?Sized>(network: &N, mtu: i64) -> Result<Network> {
    if let Some(existing) = network.find_networks(PHYSICAL_NETWORK).await?.into_iter().next() {
        info!("Not creating {PHYSICAL_NETWORK} network, because it already exists.");
        return Ok(existing);
    }

    let created = network
        .create_network(PHYSICAL_NETWORK, PHYSICAL_NETWORK, mtu)
        .await
        .inspect_err(|e| info!("Network create/update failed {e}"))?;
    info!("Network created {}", created.id);
    if let Some(segment) = network.list_segments(&created.id, None).await?.into_iter().next() {
        network.delete_segment(&segment.id).await?;
        info!("Default segment on network {} deleted.", created.name);
    }
    Ok(created)
}

fn is_ipv6(subnet: &SubnetConfig) -> bool {
    subnet.dhcp_start.as_deref().is_some_and(|start| start.contains(':'))
}

fn allocation_pools(subnet: &SubnetConfig) -> Vec<AllocationPool> {
    vec![AllocationPool {
        start: subnet.dhcp_start.clone().unwrap_or_default(),
        end: subnet.dhcp_end.clone().unwrap_or_default(),
    }]
}

/// Metadata route, or none for IPv6 subnets.
fn host_routes(subnet: &SubnetConfig, nexthop: &str) -> Vec<HostRoute> {
    if is_ipv6(subnet) {
        return Vec::new();
    }
    vec![HostRoute {
        destination: METADATA_DESTINATION.to_string(),
        nexthop: nexthop.to_string(),
    }]
}

fn subnet_request(
    subnet: &SubnetConfig,
    network_id: &str,
    nexthop: &str,
    segment_id: Option<String>,
) -> SubnetRequest {
    let ipv6 = is_ipv6(subnet);
    let mode = ipv6.then(|| "dhcpv6-stateless".to_string());
    SubnetRequest {
        name: subnet.name.clone(),
        cidr: subnet.cidr_str().to_string(),
        gateway_ip: subnet.gateway_str().to_string(),
        host_routes: host_routes(subnet, nexthop),
        enable_dhcp: true,
        ip_version: if ipv6 { 6 } else { 4 },
        ipv6_address_mode: mode.clone(),
        ipv6_ra_mode: mode,
        allocation_pools: allocation_pools(subnet),
        network_id: network_id.to_string(),
        segment_id,
    }
}

fn subnet_update(subnet: &SubnetConfig, nexthop: &str) -> SubnetUpdate {
    SubnetUpdate {
        name: subnet.name.clone(),
        gateway_ip: subnet.gateway_str().to_string(),
        host_routes: host_routes(subnet, nexthop),
        allocation_pools: allocation_pools(subnet),
    }
}

async fn ensure_router<N: NetworkApi + ?Sized>(
    network: &N,
    name: &str,
    subnet_id: &str,
    changes: &mut SubnetChanges,
) -> Result<()> {
    if let Some(router) = network.find_routers(name).await?.into_iter().next() {
        info!("Router for subnet {name} already exists {}", router.id);
        return Ok(());
    }
    let router = network
        .create_router(name)
        .await
        .inspect_err(|e| error!("Create router for subnet {name} failed: {e}"))?;
    network.add_router_interface(&router.id, subnet_id).await?;
    changes.routers_created.push(name.to_string());
    Ok(())
}

/// Reconciles segments and subnets of the `ctlplane` network with the
/// configured subnets.
///
/// A pre-existing local subnet without a segment is only updated and all
/// other subnets are ignored. Otherwise each subnet is matched by CIDR and
/// its segment by physical network. IPv6 subnets get a router so router
/// advertisements are sent.
///
/// # Errors
///
/// Returns [`ReconcileError::LocalSubnetConflict`] when the local subnet's
/// CIDR is bound to a different segment, or any API error.
pub async fn reconcile_subnets<N: NetworkApi + ?Sized>(
    network: &N,
    config: &UndercloudConfig,
    network_id: &str,
) -> Result<SubnetChanges> {
    let mut changes = SubnetChanges::default();
    let local_name = config.string("local_subnet");
    let local = config.local_subnet()?;
    let local_address = addr::local_ip_address(config.local_ip());

    let existing = first_subnet(network, local.cidr_str(), network_id).await?;
    if let Some(subnet) = existing.filter(|subnet| subnet.segment_id.is_none()) {
        warn!(
            "Local subnet {local_name} already exists and is not associated with a network \
             segment. Any additional subnets will be ignored."
        );
        network
            .update_subnet(&subnet.id, &subnet_update(local, &local_address))
            .await
            .inspect_err(|e| error!("Update subnet {local_name} failed: {e}"))?;
        info!("Subnet updated {}", subnet.id);
        changes.updated.push(local_name.to_string());
        if is_ipv6(local) {
            ensure_router(network, local_name, &subnet.id, &mut changes).await?;
        }
        return Ok(changes);
    }

    let routed = config.flag("enable_routed_networks");
    for subnet_config in config.subnets() {
        let name = subnet_config.name.as_str();
        let is_local = name == local_name;
        let (phynet, nexthop) = if is_local {
            (PHYSICAL_NETWORK, local_address.as_str())
        } else {
            (name, subnet_config.gateway_str())
        };

        let subnet = first_subnet(network, subnet_config.cidr_str(), network_id).await?;
        let segment = network
            .list_segments(network_id, Some(phynet))
            .await?
            .into_iter()
            .next();

        if is_local {
            if let Some(subnet) = &subnet {
                let bound_elsewhere = match &segment {
                    None => true,
                    Some(segment) => subnet.segment_id.as_deref() != Some(segment.id.as_str()),
                };
                if bound_elsewhere {
                    let conflict = ReconcileError::LocalSubnetConflict {
                        cidr: subnet_config.cidr_str().to_string(),
                        subnet_id: subnet.id.clone(),
                        segment_id: subnet.segment_id.clone().unwrap_or_else(|| "None".to_string()),
                    };
                    error!("{conflict}");
                    return Err(conflict.into());
                }
            }
        }

        let subnet_id = if let Some(subnet) = subnet {
            if let Some(segment_id) = &subnet.segment_id {
                network.update_segment(segment_id, name).await?;
                info!("Neutron Segment updated {segment_id}");
            }
            network
                .update_subnet(&subnet.id, &subnet_update(subnet_config, nexthop))
                .await
                .inspect_err(|e| error!("Update subnet {name} failed: {e}"))?;
            info!("Subnet updated {}", subnet.id);
            changes.updated.push(name.to_string());
            Some(subnet.id)
        } else {
            let segment = match segment {
                Some(segment) => {
                    network.update_segment(&segment.id, name).await?;
                    info!("Neutron Segment updated {}", segment.id);
                    segment
                }
                None => {
                    let segment = network
                        .create_segment(name, network_id, phynet)
                        .await
                        .inspect_err(|e| info!("Neutron Segment {name} create failed {e}"))?;
                    info!("Neutron Segment created {}", segment.id);
                    changes.segments_created.push(name.to_string());
                    segment
                }
            };

            let segment_id = if routed {
                Some(segment.id)
            } else if is_local {
                None
            } else {
                // Without routed networks only the local subnet is created.
                continue;
            };
            let request = subnet_request(subnet_config, network_id, nexthop, segment_id);
            let created = network
                .create_subnet(&request)
                .await
                .inspect_err(|e| error!("Create subnet {name} failed: {e}"))?;
            info!("Subnet created {}", created.id);
            changes.created.push(name.to_string());
            Some(created.id)
        };

        if let Some(subnet_id) = subnet_id {
            if is_ipv6(subnet_config) {
                ensure_router(network, name, &subnet_id, &mut changes).await?;
            }
        }
    }
    Ok(changes)
}

async fn first_subnet<N: NetworkApi + ?Sized>(
    network: &N,
    cidr: &str,
    network_id: &str,
) -> Result<Option<Subnet>> {
    Ok(network.find_subnets(cidr, network_id).await?.into_iter().next())
}

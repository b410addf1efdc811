//! Address and CIDR helpers shared by validation, generation and reconciliation.

use ipnetwork::IpNetwork;
use std::net::IpAddr;

/// Parses a bare IP address, ignoring surrounding whitespace.
#[must_use]
pub fn parse_ip(value: &str) -> Option<IpAddr> {
    value.trim().parse().ok()
}

/// Parses a network in CIDR notation. Host bits may be set.
///
/// # Errors
///
/// Returns the parser message when the value is not a network.
pub fn parse_network(value: &str) -> std::result::Result<IpNetwork, String> {
    value
        .trim()
        .parse::<IpNetwork>()
        .map_err(|e| e.to_string())
}

/// Integer form of an address, used for range ordering and overlap checks.
#[must_use]
pub fn ip_to_int(ip: IpAddr) -> u128 {
    match ip {
        IpAddr::V4(v4) => u128::from(u32::from(v4)),
        IpAddr::V6(v6) => u128::from(v6),
    }
}

/// Splits `local_ip` into its address and prefix length.
#[must_use]
pub fn split_local_ip(value: &str) -> Option<(IpAddr, u8)> {
    let network = parse_network(value).ok()?;
    Some((network.ip(), network.prefix()))
}

/// Address part of `local_ip`, or the raw value when it does not parse.
#[must_use]
pub fn local_ip_address(value: &str) -> String {
    value.split('/').next().unwrap_or(value).to_string()
}

/// Wraps IPv6 literals in brackets for use in URLs.
#[must_use]
pub fn wrap_ipv6(host: &str) -> String {
    match parse_ip(host) {
        Some(IpAddr::V6(_)) => format!("[{host}]"),
        _ => host.to_string(),
    }
}

/// True when the two networks share at least one address.
#[must_use]
pub fn cidr_overlaps(a: &IpNetwork, b: &IpNetwork) -> bool {
    if a.is_ipv4() != b.is_ipv4() {
        return false;
    }
    let (a_first, a_last) = bounds(a);
    let (b_first, b_last) = bounds(b);
    a_first <= b_last && b_first <= a_last
}

fn bounds(network: &IpNetwork) -> (u128, u128) {
    match network {
        IpNetwork::V4(net) => (
            u128::from(u32::from(net.network())),
            u128::from(u32::from(net.broadcast())),
        ),
        IpNetwork::V6(net) => {
            let host_bits = 128 - u32::from(net.prefix());
            let first = u128::from(net.network());
            let last = if host_bits >= 128 {
                u128::MAX
            } else {
                first | ((1u128 << host_bits) - 1)
            };
            (first, last)
        }
    }
}

/// Network address and prefix rendered as `a.b.c.d/nn`.
#[must_use]
pub fn canonical_cidr(network: &IpNetwork) -> String {
    format!("{}/{}", network.network(), network.prefix())
}

//! Service endpoint URLs.
//!
//! Each logical service gets `UNDERCLOUD_ENDPOINT_<NAME>_{PUBLIC,INTERNAL,ADMIN}`.
//! Public endpoints switch to TLS ports and the public host when a service
//! certificate is in use.

use std::collections::BTreeMap;

use crate::config::addr::wrap_ipv6;

/// Endpoint variants written for every service.
pub const VARIANTS: [&str; 3] = ["PUBLIC", "INTERNAL", "ADMIN"];

/// Port layout of one logical service.
#[derive(Debug, Clone, Copy)]
pub struct ServiceEndpoint {
    /// Service name, e.g. `heat-cfn`.
    pub name: &'static str,
    /// Path appended after `proto://host:port`.
    pub path: &'static str,
    /// Plain port, used for internal and admin endpoints.
    pub port: u16,
    /// Public port when TLS is in use.
    pub ssl_port: u16,
    /// Admin port when it differs from the internal port.
    pub admin_port: Option<u16>,
    /// Uses `ws`/`wss` instead of `http`/`https`.
    pub websocket: bool,
}

impl ServiceEndpoint {
    const fn http(name: &'static str, path: &'static str, port: u16, ssl_port: u16) -> Self {
        Self {
            name,
            path,
            port,
            ssl_port,
            admin_port: None,
            websocket: false,
        }
    }

    const fn ws(name: &'static str, path: &'static str, port: u16, ssl_port: u16) -> Self {
        Self {
            websocket: true,
            ..Self::http(name, path, port, ssl_port)
        }
    }

    const fn admin(self, port: u16) -> Self {
        Self {
            admin_port: Some(port),
            ..self
        }
    }

    /// Upper-cased name used in environment keys.
    #[must_use]
    pub fn key_name(&self) -> String {
        self.name.to_uppercase().replace('-', "_")
    }
}

/// Every service the undercloud exposes.
pub const SERVICES: &[ServiceEndpoint] = &[
    ServiceEndpoint::http("heat", "/v1/%(tenant_id)s", 8004, 13004),
    ServiceEndpoint::http("heat-cfn", "/v1/%(tenant_id)s", 8000, 13800),
    ServiceEndpoint::http("heat-ui-proxy", "", 8004, 13004),
    ServiceEndpoint::http("heat-ui-config", "/heat/v1/%(project_id)s", 3000, 443),
    ServiceEndpoint::http("neutron", "", 9696, 13696),
    ServiceEndpoint::http("glance", "", 9292, 13292),
    ServiceEndpoint::http("nova", "/v2.1", 8774, 13774),
    ServiceEndpoint::http("nova-ui-proxy", "", 8774, 13774),
    ServiceEndpoint::http("nova-ui-config", "/nova/v2.1", 3000, 443),
    ServiceEndpoint::http("placement", "/placement", 8778, 13778),
    ServiceEndpoint::http("keystone", "", 5000, 13000).admin(35357),
    ServiceEndpoint::http("keystone-ui-config", "/keystone/v3", 3000, 443).admin(35357),
    ServiceEndpoint::http("swift", "/v1/AUTH_%(tenant_id)s", 8080, 13808),
    ServiceEndpoint::http("swift-ui-proxy", "", 8080, 13808),
    ServiceEndpoint::http("swift-ui-config", "/swift/v1/AUTH_%(project_id)s", 3000, 443),
    ServiceEndpoint::http("ironic", "", 6385, 13385),
    ServiceEndpoint::http("ironic-ui-config", "/ironic", 3000, 443),
    ServiceEndpoint::http("ironic_inspector", "", 5050, 13050),
    ServiceEndpoint::http("ironic_inspector-ui-config", "/ironic-inspector", 3000, 443),
    ServiceEndpoint::http("aodh", "", 8042, 13042),
    ServiceEndpoint::http("gnocchi", "", 8041, 13041),
    ServiceEndpoint::http("panko", "", 8977, 13977),
    ServiceEndpoint::http("mistral", "/v2", 8989, 13989),
    ServiceEndpoint::http("mistral-ui-proxy", "", 8989, 13989),
    ServiceEndpoint::http("mistral-ui-config", "/mistral/v2", 3000, 443),
    ServiceEndpoint::http("zaqar", "", 8888, 13888),
    ServiceEndpoint::http("cinder", "/v1/%(tenant_id)s", 8776, 13776),
    ServiceEndpoint::http("cinder_v2", "/v2/%(tenant_id)s", 8776, 13776),
    ServiceEndpoint::http("cinder_v3", "/v3/%(tenant_id)s", 8776, 13776),
    // The websocket endpoint cannot be proxied on another port.
    ServiceEndpoint::ws("zaqar-websocket", "", 9000, 9000),
    ServiceEndpoint::ws("zaqar-ui-proxy", "", 9000, 443),
    ServiceEndpoint::ws("zaqar-ui-config", "/zaqar", 3000, 443),
];

/// Hosts and protocol choice for endpoint generation.
#[derive(Debug, Clone)]
pub struct EndpointHosts {
    /// Host for public endpoints.
    pub public_host: String,
    /// Host for internal and admin endpoints.
    pub internal_host: String,
    /// True when the public endpoints use TLS.
    pub tls: bool,
}

impl EndpointHosts {
    /// Picks hosts: the configured public/admin hosts under TLS, otherwise
    /// the local IP for everything.
    #[must_use]
    pub fn new(local_ip: &str, public_host: &str, admin_host: &str, tls: bool) -> Self {
        if tls {
            Self {
                public_host: public_host.to_string(),
                internal_host: admin_host.to_string(),
                tls,
            }
        } else {
            Self {
                public_host: local_ip.to_string(),
                internal_host: local_ip.to_string(),
                tls,
            }
        }
    }
}

/// All endpoint keys, independent of host settings.
pub fn endpoint_keys() -> impl Iterator<Item = String> {
    SERVICES.iter().flat_map(|service| {
        let name = service.key_name();
        VARIANTS
            .into_iter()
            .map(move |variant| format!("UNDERCLOUD_ENDPOINT_{name}_{variant}"))
    })
}

/// Generates every endpoint URL.
#[must_use]
pub fn generate_endpoints(hosts: &EndpointHosts) -> BTreeMap<String, String> {
    let public_host = wrap_ipv6(&hosts.public_host);
    let internal_host = wrap_ipv6(&hosts.internal_host);
    let mut endpoints = BTreeMap::new();

    for service in SERVICES {
        let (plain, secure) = if service.websocket {
            ("ws", "wss")
        } else {
            ("http", "https")
        };
        let (public_proto, public_port) = if hosts.tls {
            (secure, service.ssl_port)
        } else {
            (plain, service.port)
        };
        let admin_port = service.admin_port.unwrap_or(service.port);
        let name = service.key_name();

        endpoints.insert(
            format!("UNDERCLOUD_ENDPOINT_{name}_PUBLIC"),
            format!("{public_proto}://{public_host}:{public_port}{}", service.path),
        );
        endpoints.insert(
            format!("UNDERCLOUD_ENDPOINT_{name}_INTERNAL"),
            format!("{plain}://{internal_host}:{}{}", service.port, service.path),
        );
        endpoints.insert(
            format!("UNDERCLOUD_ENDPOINT_{name}_ADMIN"),
            format!("{plain}://{internal_host}:{admin_port}{}", service.path),
        );
    }

    // Swift's admin endpoint carries no account path.
    endpoints.insert(
        "UNDERCLOUD_ENDPOINT_SWIFT_ADMIN".to_string(),
        format!("http://{internal_host}:8080"),
    );
    endpoints
}

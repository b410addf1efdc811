//! Declarative option schema.
//!
//! Every option the installer understands is described once here. The
//! tables are immutable; [`super::UndercloudConfig`] loads values against
//! them and the environment generator copies them under upper-cased keys.

/// Name of the physical network backing the provisioning network.
pub const PHYSICAL_NETWORK: &str = "ctlplane";

/// Subnet configured when `subnets` is not set.
pub const DEFAULT_SUBNET: &str = "ctlplane-subnet";

/// Resource class assigned to bare-metal nodes without one.
pub const DEFAULT_NODE_RESOURCE_CLASS: &str = "baremetal";

/// Architectures that may be listed in `additional_architectures`.
pub const SUPPORTED_ARCHITECTURES: &[&str] = &["ppc64le"];

/// Section holding secrets in both INI files.
pub const AUTH_SECTION: &str = "auth";

/// Value type of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    /// Free-form string.
    Str,
    /// Boolean flag.
    Bool,
    /// Integer, optionally bounded below.
    Int,
    /// Comma separated list.
    List,
}

/// Where an option lives in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionGroup {
    /// The `[DEFAULT]` section.
    Global,
    /// One section per subnet listed in `subnets`.
    Subnet,
    /// The `[auth]` section.
    Auth,
}

/// Description of one configuration option.
#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    /// Canonical option name.
    pub name: &'static str,
    /// Value type.
    pub kind: OptionKind,
    /// Group the option belongs to.
    pub group: OptionGroup,
    /// Default as it would be written in the INI file.
    pub default: Option<&'static str>,
    /// Older name still accepted.
    pub deprecated_name: Option<&'static str>,
    /// Deprecated alias lives in `[DEFAULT]` instead of the option's own group.
    pub deprecated_in_default: bool,
    /// Lower bound for integer options.
    pub min: Option<i64>,
    /// Help text for sample configuration output.
    pub help: &'static str,
}

impl OptionSpec {
    const fn new(
        name: &'static str,
        kind: OptionKind,
        default: Option<&'static str>,
        help: &'static str,
    ) -> Self {
        Self {
            name,
            kind,
            group: OptionGroup::Global,
            default,
            deprecated_name: None,
            deprecated_in_default: false,
            min: None,
            help,
        }
    }

    const fn string(name: &'static str, default: Option<&'static str>, help: &'static str) -> Self {
        Self::new(name, OptionKind::Str, default, help)
    }

    const fn boolean(name: &'static str, default: &'static str, help: &'static str) -> Self {
        Self::new(name, OptionKind::Bool, Some(default), help)
    }

    const fn list(name: &'static str, default: &'static str, help: &'static str) -> Self {
        Self::new(name, OptionKind::List, Some(default), help)
    }

    const fn secret(name: &'static str) -> Self {
        Self {
            group: OptionGroup::Auth,
            ..Self::new(name, OptionKind::Str, None, "")
        }
    }

    const fn subnet(self) -> Self {
        Self {
            group: OptionGroup::Subnet,
            ..self
        }
    }

    const fn deprecated(self, alias: &'static str) -> Self {
        Self {
            deprecated_name: Some(alias),
            ..self
        }
    }

    const fn deprecated_default(self, alias: &'static str) -> Self {
        Self {
            deprecated_name: Some(alias),
            deprecated_in_default: true,
            ..self
        }
    }

    const fn with_min(self, min: i64) -> Self {
        Self {
            min: Some(min),
            ..self
        }
    }

    /// Upper-cased environment key for this option.
    #[must_use]
    pub fn env_key(&self) -> String {
        self.name.to_uppercase()
    }
}

/// Options of the `[DEFAULT]` section.
pub const GLOBAL_OPTIONS: &[OptionSpec] = &[
    OptionSpec::string(
        "undercloud_hostname",
        None,
        "Fully qualified hostname (including domain) to set on the Undercloud.",
    ),
    OptionSpec::string(
        "local_ip",
        Some("192.168.24.1/24"),
        "IP information for the interface handling PXE boots and DHCP for Overcloud instances.",
    ),
    OptionSpec::string(
        "undercloud_public_host",
        Some("192.168.24.2"),
        "Virtual IP or DNS address for the public endpoints. Only used with SSL.",
    )
    .deprecated("undercloud_public_vip"),
    OptionSpec::string(
        "undercloud_admin_host",
        Some("192.168.24.3"),
        "Virtual IP or DNS address for the admin endpoints. Only used with SSL.",
    )
    .deprecated("undercloud_admin_vip"),
    OptionSpec::list(
        "undercloud_nameservers",
        "",
        "DNS nameserver(s) to use for the undercloud node.",
    ),
    OptionSpec::list("undercloud_ntp_servers", "", "List of ntp servers to use."),
    OptionSpec::string(
        "overcloud_domain_name",
        Some("localdomain"),
        "DNS domain name to use when deploying the overcloud.",
    ),
    OptionSpec::list(
        "subnets",
        DEFAULT_SUBNET,
        "List of routed network subnets for provisioning and introspection.",
    ),
    OptionSpec::string(
        "local_subnet",
        Some(DEFAULT_SUBNET),
        "Name of the local subnet where PXE boot and DHCP interfaces are located.",
    ),
    OptionSpec::string(
        "undercloud_service_certificate",
        Some(""),
        "Certificate file to use for OpenStack service SSL connections.",
    ),
    OptionSpec::boolean(
        "generate_service_certificate",
        "false",
        "Generate an SSL certificate during install and use it for the service endpoints.",
    ),
    OptionSpec::string(
        "certificate_generation_ca",
        Some("local"),
        "The certmonger nickname of the CA from which the certificate will be requested.",
    ),
    OptionSpec::string(
        "service_principal",
        Some(""),
        "The kerberos principal for the service that will use the certificate.",
    ),
    OptionSpec::string(
        "local_interface",
        Some("eth1"),
        "Network interface handling PXE boots and DHCP for Overcloud instances.",
    ),
    OptionSpec::new(
        "local_mtu",
        OptionKind::Int,
        Some("1500"),
        "MTU to use for the local_interface.",
    ),
    OptionSpec::string(
        "masquerade_network",
        Some("192.168.24.0/24"),
        "Network that will be masqueraded for external access. Deprecated.",
    ),
    OptionSpec::string(
        "hieradata_override",
        Some(""),
        "Path to hieradata override file.",
    ),
    OptionSpec::string(
        "net_config_override",
        Some(""),
        "Path to network config override template.",
    ),
    OptionSpec::string(
        "inspection_interface",
        Some("br-ctlplane"),
        "Network interface on which inspection dnsmasq will listen.",
    )
    .deprecated("discovery_interface"),
    OptionSpec::boolean(
        "inspection_extras",
        "true",
        "Whether to enable extra hardware collection during inspection.",
    ),
    OptionSpec::boolean(
        "inspection_runbench",
        "false",
        "Whether to run benchmarks when inspecting nodes.",
    )
    .deprecated("discovery_runbench"),
    OptionSpec::boolean(
        "inspection_enable_uefi",
        "true",
        "Whether to support introspection of nodes that have UEFI-only firmware.",
    ),
    OptionSpec::boolean(
        "enable_node_discovery",
        "false",
        "Enroll any unknown node that PXE-boots the introspection ramdisk.",
    ),
    OptionSpec::string(
        "discovery_default_driver",
        Some("ipmi"),
        "Default driver or hardware type for newly discovered nodes.",
    ),
    OptionSpec::boolean(
        "undercloud_debug",
        "true",
        "Whether to enable the debug log level for Undercloud services.",
    ),
    OptionSpec::boolean(
        "undercloud_update_packages",
        "true",
        "Whether to update packages during the Undercloud install.",
    ),
    OptionSpec::boolean("enable_tempest", "true", "Whether to install Tempest."),
    OptionSpec::boolean(
        "enable_telemetry",
        "false",
        "Whether to install Telemetry services.",
    ),
    OptionSpec::boolean("enable_ui", "true", "Whether to install the TripleO UI."),
    OptionSpec::boolean(
        "enable_validations",
        "true",
        "Whether to install requirements to run the TripleO validations.",
    ),
    OptionSpec::boolean("enable_cinder", "false", "Whether to install the Volume service."),
    OptionSpec::boolean(
        "enable_novajoin",
        "false",
        "Whether to install novajoin metadata service.",
    ),
    OptionSpec::boolean(
        "enable_container_images_build",
        "true",
        "Whether to enable docker container images to be built on the undercloud.",
    ),
    OptionSpec::list(
        "docker_insecure_registries",
        "",
        "Host/port combinations of docker insecure registries.",
    ),
    OptionSpec::string(
        "ipa_otp",
        Some(""),
        "One Time Password to register the Undercloud node with an IPA server.",
    ),
    OptionSpec::boolean(
        "ipxe_enabled",
        "true",
        "Whether to use iPXE for deploy and inspection.",
    )
    .deprecated("ipxe_deploy"),
    OptionSpec::new(
        "scheduler_max_attempts",
        OptionKind::Int,
        Some("30"),
        "Maximum number of attempts the scheduler will make when deploying the instance.",
    )
    .with_min(1),
    OptionSpec::boolean(
        "clean_nodes",
        "false",
        "Whether to clean overcloud nodes between deployments and after introspection.",
    ),
    OptionSpec::list(
        "enabled_drivers",
        "pxe_ipmitool,pxe_drac,pxe_ilo",
        "List of enabled bare metal drivers. Deprecated.",
    ),
    OptionSpec::list(
        "enabled_hardware_types",
        "ipmi,redfish,ilo,idrac",
        "List of enabled bare metal hardware types.",
    ),
    OptionSpec::string(
        "docker_registry_mirror",
        Some(""),
        "An optional docker registry-mirror configured in /etc/docker/daemon.json.",
    ),
    OptionSpec::list(
        "additional_architectures",
        "",
        "List of additional architectures enabled in the cloud environment.",
    ),
    OptionSpec::boolean(
        "enable_routed_networks",
        "false",
        "Enable support for routed ctlplane networks.",
    ),
];

/// Options of each subnet section.
pub const SUBNET_OPTIONS: &[OptionSpec] = &[
    OptionSpec::string(
        "cidr",
        Some("192.168.24.0/24"),
        "Network CIDR for the Neutron-managed subnet for Overcloud instances.",
    )
    .subnet()
    .deprecated_default("network_cidr"),
    OptionSpec::string(
        "dhcp_start",
        Some("192.168.24.5"),
        "Start of DHCP allocation range on this network.",
    )
    .subnet()
    .deprecated_default("dhcp_start"),
    OptionSpec::string(
        "dhcp_end",
        Some("192.168.24.24"),
        "End of DHCP allocation range on this network.",
    )
    .subnet()
    .deprecated_default("dhcp_end"),
    OptionSpec::string(
        "inspection_iprange",
        Some("192.168.24.100,192.168.24.120"),
        "Temporary IP range given to nodes on this network during inspection.",
    )
    .subnet()
    .deprecated_default("inspection_iprange"),
    OptionSpec::string(
        "gateway",
        Some("192.168.24.1"),
        "Network gateway for the Neutron-managed network on this network.",
    )
    .subnet()
    .deprecated_default("network_gateway"),
    OptionSpec::boolean(
        "masquerade",
        "false",
        "The network will be masqueraded for external access.",
    )
    .subnet(),
];

/// Secrets of the `[auth]` section.
pub const AUTH_OPTIONS: &[OptionSpec] = &[
    OptionSpec::secret("undercloud_db_password"),
    OptionSpec::secret("undercloud_admin_token"),
    OptionSpec::secret("undercloud_admin_password"),
    OptionSpec::secret("undercloud_glance_password"),
    OptionSpec::secret("undercloud_heat_encryption_key"),
    OptionSpec::secret("undercloud_heat_password"),
    OptionSpec::secret("undercloud_heat_cfn_password"),
    OptionSpec::secret("undercloud_neutron_password"),
    OptionSpec::secret("undercloud_nova_password"),
    OptionSpec::secret("undercloud_ironic_password"),
    OptionSpec::secret("undercloud_aodh_password"),
    OptionSpec::secret("undercloud_gnocchi_password"),
    OptionSpec::secret("undercloud_ceilometer_password"),
    OptionSpec::secret("undercloud_panko_password"),
    OptionSpec::secret("undercloud_ceilometer_metering_secret"),
    OptionSpec {
        default: Some("ro_snmp_user"),
        ..OptionSpec::secret("undercloud_ceilometer_snmpd_user")
    },
    OptionSpec::secret("undercloud_ceilometer_snmpd_password"),
    OptionSpec::secret("undercloud_swift_password"),
    OptionSpec::secret("undercloud_mistral_password"),
    OptionSpec::secret("undercloud_rabbit_cookie"),
    OptionSpec::secret("undercloud_rabbit_password"),
    OptionSpec::secret("undercloud_rabbit_username"),
    OptionSpec::secret("undercloud_heat_stack_domain_admin_password"),
    OptionSpec::secret("undercloud_swift_hash_suffix"),
    OptionSpec::secret("undercloud_haproxy_stats_password"),
    OptionSpec::secret("undercloud_zaqar_password"),
    OptionSpec::secret("undercloud_horizon_secret_key"),
    OptionSpec::secret("undercloud_cinder_password"),
    OptionSpec::secret("undercloud_novajoin_password"),
];

/// Looks up a global option by canonical name.
#[must_use]
pub fn global_option(name: &str) -> Option<&'static OptionSpec> {
    GLOBAL_OPTIONS.iter().find(|opt| opt.name == name)
}

/// Iterates over every option of every group.
pub fn all_options() -> impl Iterator<Item = &'static OptionSpec> {
    GLOBAL_OPTIONS
        .iter()
        .chain(SUBNET_OPTIONS.iter())
        .chain(AUTH_OPTIONS.iter())
}

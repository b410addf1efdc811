//! Environment generation.
//!
//! Turns the loaded configuration and the host facts into the flat
//! environment read by the provisioning tools. The secrets file is written
//! as a side effect so every run ends with a complete, persisted set.

use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::drivers::DriverSettings;
use super::endpoints::{EndpointHosts, generate_endpoints};
use super::passwords::resolve_passwords;
use super::subnets::{self, set_json};
use super::Environment;
use crate::config::addr::{local_ip_address, wrap_ipv6};
use crate::config::{Paths, UndercloudConfig};
use crate::error::{ConfigError, Result};
use crate::host::HostFacts;

/// Port of the local container registry.
const REGISTRY_PORT: u16 = 8787;

/// Everything besides the configuration that generation depends on.
#[derive(Debug, Clone, Copy)]
pub struct GeneratorInputs<'a> {
    /// Facts about the running host.
    pub facts: &'a HostFacts,
    /// Filesystem layout.
    pub paths: &'a Paths,
    /// Source checkout used when the packaged data is not installed.
    pub root: &'a Path,
    /// Working directory of the invocation.
    pub cwd: &'a Path,
    /// Base environment the result is seeded from.
    pub base: &'a BTreeMap<String, String>,
}

impl GeneratorInputs<'_> {
    fn base_value(&self, key: &str) -> Option<&str> {
        self.base.get(key).map(String::as_str).filter(|value| !value.is_empty())
    }
}

/// Builds the install environment, including every secret.
///
/// Nothing is written to disk; the installer persists the secrets with
/// [`write_password_file`](super::write_password_file).
///
/// # Errors
///
/// Returns a configuration error for unsupported distributions or
/// incompatible inspection options.
pub fn generate(config: &UndercloudConfig, inputs: &GeneratorInputs<'_>) -> Result<Environment> {
    let mut env = Environment::from_base(inputs.base.clone());
    let paths = inputs.paths;

    // Rabbit relies on HOSTNAME.
    let hostname = config
        .undercloud_hostname()
        .unwrap_or(inputs.facts.hostname.as_str())
        .to_string();
    env.set("HOSTNAME", hostname)?;

    let json_file_dir = existing_dir_or(
        paths.instack_share.join("json-files"),
        inputs.root.join("json-files"),
    );
    let instack_elements = existing_dir_or(paths.instack_share.clone(), inputs.root.join("elements"));
    let puppet_elements = existing_dir_or(
        paths.puppet_elements_share.clone(),
        inputs.cwd.join("tripleo-puppet-elements").join("elements"),
    );
    let elements_path = match inputs.base_value("ELEMENTS_PATH") {
        Some(path) => path.to_string(),
        None => format!(
            "{}:{}:/usr/share/tripleo-image-elements:/usr/share/diskimage-builder/elements",
            puppet_elements.display(),
            instack_elements.display()
        ),
    };
    env.set("ELEMENTS_PATH", elements_path)?;

    for (key, value) in distribution_settings(&inputs.facts.distribution, &json_file_dir, inputs.base)? {
        env.set(key, value)?;
    }

    for arch in config.list("additional_architectures") {
        env.set(&format!("ENABLE_ARCHITECTURE_{}", arch.to_uppercase()), "True")?;
    }

    for (spec, value) in config.values() {
        env.set(&spec.env_key(), value.render())?;
    }

    apply_inspection(&mut env, config)?;

    let discovery_driver = config
        .flag("enable_node_discovery")
        .then(|| config.string("discovery_default_driver"));
    let drivers = DriverSettings::derive(
        config.list("enabled_drivers"),
        config.list("enabled_hardware_types"),
        discovery_driver,
    );
    for (key, value) in drivers.env_entries() {
        env.set(key, value)?;
    }

    subnets::apply(&mut env, config)?;

    let mut sysctl = BTreeMap::new();
    sysctl.insert("net.ipv4.ip_nonlocal_bind", json!({"value": 1}));
    if inputs.facts.ipv6_enabled {
        sysctl.insert("net.ipv6.ip_nonlocal_bind", json!({"value": 1}));
    }
    set_json(&mut env, "SYSCTL_SETTINGS", &sysctl)?;

    let local_ip = local_ip_address(config.local_ip());
    env.set("PUBLIC_INTERFACE_IP", config.local_ip())?;
    env.set("LOCAL_IP", local_ip.clone())?;
    env.set("LOCAL_IP_WRAPPED", wrap_ipv6(&local_ip))?;

    if let Some(mirror) = config.optional_string("docker_registry_mirror") {
        env.set("DOCKER_REGISTRY_MIRROR", mirror)?;
    }
    let mut registries = vec![
        format!("{local_ip}:{REGISTRY_PORT}"),
        format!("{}:{REGISTRY_PORT}", config.string("undercloud_admin_host")),
    ];
    registries.extend(config.list("docker_insecure_registries").iter().cloned());
    set_json(&mut env, "DOCKER_INSECURE_REGISTRIES", &registries)?;

    // Not in a chroot, and the tools misbehave when it is set.
    env.remove("DIB_YUM_REPO_CONF");

    env.set("TRIPLEO_INSTALL_USER", inputs.facts.user.clone())?;
    env.set(
        "TRIPLEO_UNDERCLOUD_CONF_FILE",
        paths.conf_path.display().to_string(),
    )?;
    env.set(
        "TRIPLEO_UNDERCLOUD_PASSWORD_FILE",
        paths.password_path.display().to_string(),
    )?;

    // The templates test for ENABLE_NOVAJOIN being defined at all.
    if env
        .get("ENABLE_NOVAJOIN")
        .is_some_and(|value| value.eq_ignore_ascii_case("false"))
    {
        env.remove("ENABLE_NOVAJOIN");
    }

    let hosts = EndpointHosts::new(
        &local_ip,
        config.string("undercloud_public_host"),
        config.string("undercloud_admin_host"),
        config.ssl_enabled(),
    );
    for (key, value) in generate_endpoints(&hosts) {
        env.set(&key, value)?;
    }

    resolve_passwords(config, &mut env)?;

    if let Some(certificate) = resolve_certificate_path(config, inputs.cwd, &paths.home) {
        env.set("UNDERCLOUD_SERVICE_CERTIFICATE", certificate)?;
    }

    debug!("Generated environment with {} variables", env.len());
    Ok(env)
}

/// Distribution-specific keys: `NODE_DIST`, `JSONFILE` and, on RHEL, the
/// registration flags. `NODE_DIST` and `JSONFILE` from `base` win.
///
/// # Errors
///
/// Returns [`ConfigError::UnsupportedDistribution`] for anything but RHEL
/// and CentOS.
pub fn distribution_settings(
    distribution: &str,
    json_file_dir: &Path,
    base: &BTreeMap<String, String>,
) -> Result<Vec<(&'static str, String)>> {
    let (node_dist, packages) = if distribution.starts_with("Red Hat Enterprise Linux") {
        ("rhel7", "rhel-7-undercloud-packages.json")
    } else if distribution.starts_with("CentOS") {
        ("centos7", "centos-7-undercloud-packages.json")
    } else if distribution.starts_with("Fedora") {
        return Err(ConfigError::UnsupportedDistribution {
            distribution: "Fedora".to_string(),
        }
        .into());
    } else {
        return Err(ConfigError::UnsupportedDistribution {
            distribution: distribution.to_string(),
        }
        .into());
    };

    let from_base = |key: &str| base.get(key).filter(|value| !value.is_empty()).cloned();
    let mut settings = vec![
        ("NODE_DIST", from_base("NODE_DIST").unwrap_or_else(|| node_dist.to_string())),
        (
            "JSONFILE",
            from_base("JSONFILE")
                .unwrap_or_else(|| json_file_dir.join(packages).display().to_string()),
        ),
    ];
    if node_dist == "rhel7" {
        settings.push(("REG_METHOD", "disable".to_string()));
        settings.push(("REG_HALT_UNREGISTER", "1".to_string()));
    }
    Ok(settings)
}

fn apply_inspection(env: &mut Environment, config: &UndercloudConfig) -> Result<()> {
    let extras = config.flag("inspection_extras");
    let runbench = config.flag("inspection_runbench");
    if runbench && !extras {
        return Err(ConfigError::Incompatible {
            message: "inspection_extras must be enabled for inspection_runbench to work"
                .to_string(),
        }
        .into());
    }

    let collectors = if extras {
        "default,extra-hardware,numa-topology,logs"
    } else {
        "default,logs"
    };
    env.set("INSPECTION_COLLECTORS", collectors)?;

    let mut kernel_args = Vec::new();
    if config.flag("undercloud_debug") {
        kernel_args.push("ipa-debug=1");
    }
    if runbench {
        kernel_args.push("ipa-inspection-benchmarks=cpu,mem,disk");
    }
    if extras {
        kernel_args.push("ipa-inspection-dhcp-all-interfaces=1");
        kernel_args.push("ipa-collect-lldp=1");
    }
    env.set("INSPECTION_KERNEL_ARGS", kernel_args.join(" "))?;
    Ok(())
}

/// Resolves the service certificate location.
///
/// Generation mode uses a fixed path named after the public host. A
/// relative path resolves against the working directory when that differs
/// from home and the file exists there, otherwise against home.
#[must_use]
pub fn resolve_certificate_path(config: &UndercloudConfig, cwd: &Path, home: &Path) -> Option<String> {
    if config.flag("generate_service_certificate") {
        return Some(format!(
            "/etc/pki/tls/certs/undercloud-{}.pem",
            config.string("undercloud_public_host")
        ));
    }
    let raw = config.optional_string("undercloud_service_certificate")?;
    let path = Path::new(raw);
    if path.is_absolute() {
        return Some(raw.to_string());
    }
    let in_cwd = cwd.join(path);
    if cwd != home && in_cwd.exists() {
        warn!(
            "Using undercloud_service_certificate from current directory, \
             please use an absolute path to remove ambiguity"
        );
        Some(in_cwd.display().to_string())
    } else {
        Some(home.join(path).display().to_string())
    }
}

fn existing_dir_or(preferred: PathBuf, fallback: PathBuf) -> PathBuf {
    if preferred.is_dir() {
        preferred
    } else {
        debug!("{} not found, using {}", preferred.display(), fallback.display());
        fallback
    }
}

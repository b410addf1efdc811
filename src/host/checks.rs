//! Host precondition checks.
//!
//! All checks run before anything on the host is modified.

use serde::Deserialize;
use std::path::Path;
use tracing::{error, info};

use super::facts::{HostFacts, ipv6_enabled};
use crate::config::{Paths, UndercloudConfig};
use crate::error::{HostError, Result};
use crate::process::{CommandRunner, RunOptions, argv};

/// Minimum memory plus swap, in megabytes.
pub const REQUIRED_MB: u64 = 7680;

/// Bridge carrying the provisioning network.
const CTLPLANE_BRIDGE: &str = "br-ctlplane";

/// Ensures the static and transient hostnames agree and resolve locally.
///
/// With `apply` set, a configured `undercloud_hostname` is applied first,
/// and a hostname missing from the hosts file is added to the loopback
/// entry, which requires a fully qualified name. Without it the host is
/// only inspected.
///
/// # Errors
///
/// Returns [`HostError::HostnameMismatch`],
/// [`HostError::NotFullyQualified`] or [`HostError::Inspection`] when the
/// hosts file cannot be read, or any command failure.
pub async fn check_hostname(
    runner: &dyn CommandRunner,
    config: &UndercloudConfig,
    hosts_file: &Path,
    apply: bool,
) -> Result<()> {
    let hostnamectl = RunOptions::named("hostnamectl");
    if let (true, Some(hostname)) = (apply, config.undercloud_hostname()) {
        runner
            .run(&argv(&["sudo", "hostnamectl", "set-hostname", hostname]), hostnamectl)
            .await?;
    }

    info!("Checking for a FQDN hostname...");
    let static_name = runner
        .run(&argv(&["sudo", "hostnamectl", "--static"]), hostnamectl)
        .await?
        .trim_end()
        .to_string();
    info!("Static hostname detected as {static_name}");
    let transient_name = runner
        .run(&argv(&["sudo", "hostnamectl", "--transient"]), hostnamectl)
        .await?
        .trim_end()
        .to_string();
    info!("Transient hostname detected as {transient_name}");

    if static_name != transient_name {
        error!("Static hostname \"{static_name}\" does not match transient hostname \"{transient_name}\".");
        return Err(HostError::HostnameMismatch {
            static_name,
            transient_name,
        }
        .into());
    }

    let hosts = std::fs::read_to_string(hosts_file).map_err(|e| HostError::Inspection {
        message: format!("cannot read {}: {e}", hosts_file.display()),
    })?;
    if hosts_contains(&hosts, &static_name) {
        return Ok(());
    }

    let short_name = static_name.split('.').next().unwrap_or(&static_name);
    if short_name == static_name {
        return Err(HostError::NotFullyQualified {
            hostname: static_name,
        }
        .into());
    }
    if !apply {
        info!(
            "{static_name} is missing from {} and will be added on install",
            hosts_file.display()
        );
        return Ok(());
    }
    let sed = format!(
        "sed -i \"s/127.0.0.1\\(\\s*\\)/127.0.0.1\\1{static_name} {short_name} /\" {}",
        hosts_file.display()
    );
    runner
        .run(
            &argv(&["sudo", "/bin/bash", "-c", &sed]),
            RunOptions::named("hostname-to-etc-hosts"),
        )
        .await?;
    info!("Added hostname {static_name} to {}", hosts_file.display());
    Ok(())
}

/// True when a non-comment line of the hosts file lists `hostname`.
#[must_use]
pub fn hosts_contains(hosts: &str, hostname: &str) -> bool {
    hosts
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .any(|line| line.split_whitespace().any(|token| token == hostname))
}

/// Ensures memory plus swap reaches [`REQUIRED_MB`].
///
/// # Errors
///
/// Returns [`HostError::InsufficientMemory`].
pub fn check_memory(facts: &HostFacts) -> Result<()> {
    if facts.total_memory_mb < REQUIRED_MB {
        error!(
            "At least {REQUIRED_MB} MB of memory is required for undercloud installation. \
             A minimum of 8 GB is recommended. Only detected {} MB",
            facts.total_memory_mb
        );
        return Err(HostError::InsufficientMemory {
            required_mb: REQUIRED_MB,
            detected_mb: facts.total_memory_mb,
        }
        .into());
    }
    Ok(())
}

/// Ensures the kernel exposes the sysctl knobs the services set.
///
/// # Errors
///
/// Returns [`HostError::MissingSysctl`] listing every missing knob.
pub fn check_sysctl(paths: &Paths) -> Result<()> {
    let mut options = vec!["net.ipv4.ip_forward", "net.ipv4.ip_nonlocal_bind"];
    if ipv6_enabled(&paths.proc_root) {
        options.push("net.ipv6.ip_nonlocal_bind");
    }

    let missing: Vec<String> = options
        .into_iter()
        .filter(|option| !paths.proc(format!("sys/{}", option.replace('.', "/"))).is_file())
        .map(str::to_string)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        error!(
            "Required sysctl options are not available. Check that your kernel is up to date. \
             Missing: {}",
            missing.join(", ")
        );
        Err(HostError::MissingSysctl { options: missing }.into())
    }
}

#[derive(Debug, Deserialize)]
struct NetConfig {
    #[serde(default)]
    network_config: Vec<NetInterface>,
}

#[derive(Debug, Deserialize)]
struct NetInterface {
    #[serde(default)]
    name: String,
    #[serde(default)]
    addresses: Vec<NetAddress>,
}

#[derive(Debug, Deserialize)]
struct NetAddress {
    ip_netmask: String,
}

/// Refuses to change `local_ip` on an existing installation.
///
/// Nothing is checked before the first install or when the control plane
/// bridge was never configured.
///
/// # Errors
///
/// Returns [`HostError::LocalIpChanged`] or an error if the network
/// configuration cannot be parsed.
pub fn validate_no_ip_change(paths: &Paths, local_ip: &str) -> Result<()> {
    if !paths.os_net_config.is_file() {
        return Ok(());
    }
    let text = std::fs::read_to_string(&paths.os_net_config)?;
    let config: NetConfig = serde_json::from_str(&text).map_err(|e| HostError::Inspection {
        message: format!("invalid {}: {e}", paths.os_net_config.display()),
    })?;

    let existing = config
        .network_config
        .iter()
        .find(|iface| iface.name == CTLPLANE_BRIDGE)
        .and_then(|iface| iface.addresses.first())
        .map(|address| address.ip_netmask.as_str());

    match existing {
        Some(existing) if existing != local_ip => {
            let err = HostError::LocalIpChanged {
                existing: existing.to_string(),
                configured: local_ip.to_string(),
            };
            error!("{err}");
            Err(err.into())
        }
        _ => Ok(()),
    }
}

/// Refuses to continue when a previous install left a stackrc but no
/// passwords file.
///
/// # Errors
///
/// Returns [`HostError::PasswordsFileMissing`].
pub fn validate_passwords_file(paths: &Paths) -> Result<()> {
    if paths.stackrc.is_file() && !paths.password_path.is_file() {
        return Err(HostError::PasswordsFileMissing {
            path: paths.password_path.clone(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UndercloudError;
    use crate::process::testing::FakeRunner;
    use tempfile::TempDir;

    fn facts(memory_mb: u64) -> HostFacts {
        HostFacts {
            hostname: "undercloud.localdomain".to_string(),
            distribution: "CentOS Linux".to_string(),
            interfaces: vec!["eth0".to_string(), "eth1".to_string()],
            total_memory_mb: memory_mb,
            ipv6_enabled: false,
            user: "stack".to_string(),
        }
    }

    fn hosts_file(dir: &TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("hosts");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_hosts_contains_ignores_comments() {
        let hosts = "# 127.0.0.1 undercloud.localdomain\n127.0.0.1 localhost\n";
        assert!(!hosts_contains(hosts, "undercloud.localdomain"));
        assert!(hosts_contains("10.0.0.1 undercloud.localdomain undercloud\n", "undercloud"));
        assert!(!hosts_contains("10.0.0.1 undercloud.localdomain\n", "undercloud"));
    }

    #[tokio::test]
    async fn test_hostname_mismatch() {
        let dir = TempDir::new().unwrap();
        let runner = FakeRunner::new()
            .respond("--static", "static.example.com\n")
            .respond("--transient", "transient.example.com\n");
        let err = check_hostname(&runner, &UndercloudConfig::default(), &hosts_file(&dir, ""), true)
            .await
            .unwrap_err();
        assert!(matches!(err, UndercloudError::Host(HostError::HostnameMismatch { .. })));
    }

    #[tokio::test]
    async fn test_hostname_already_in_hosts() {
        let dir = TempDir::new().unwrap();
        let runner = FakeRunner::new().respond("hostnamectl --", "undercloud.example.com\n");
        let hosts = hosts_file(&dir, "127.0.0.1 localhost undercloud.example.com\n");
        check_hostname(&runner, &UndercloudConfig::default(), &hosts, true)
            .await
            .unwrap();
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_hostname_added_to_hosts() {
        let dir = TempDir::new().unwrap();
        let runner = FakeRunner::new().respond("hostnamectl --", "undercloud.example.com\n");
        let mut config = UndercloudConfig::default();
        config
            .set_option("undercloud_hostname", "undercloud.example.com")
            .unwrap();
        let hosts = hosts_file(&dir, "127.0.0.1 localhost\n");
        check_hostname(&runner, &config, &hosts, true).await.unwrap();

        let lines = runner.command_lines();
        assert_eq!(lines[0], "sudo hostnamectl set-hostname undercloud.example.com");
        assert!(lines[3].starts_with("sudo /bin/bash -c sed -i"));
        assert!(lines[3].contains("undercloud.example.com undercloud /"));
    }

    #[tokio::test]
    async fn test_short_hostname_rejected() {
        let dir = TempDir::new().unwrap();
        let runner = FakeRunner::new().respond("hostnamectl --", "undercloud\n");
        let err = check_hostname(&runner, &UndercloudConfig::default(), &hosts_file(&dir, ""), true)
            .await
            .unwrap_err();
        assert!(matches!(err, UndercloudError::Host(HostError::NotFullyQualified { .. })));
    }

    #[tokio::test]
    async fn test_inspection_leaves_host_alone() {
        let dir = TempDir::new().unwrap();
        let runner = FakeRunner::new().respond("hostnamectl --", "undercloud.example.com\n");
        let mut config = UndercloudConfig::default();
        config
            .set_option("undercloud_hostname", "undercloud.example.com")
            .unwrap();
        let hosts = hosts_file(&dir, "127.0.0.1 localhost\n");
        check_hostname(&runner, &config, &hosts, false).await.unwrap();

        assert_eq!(
            runner.command_lines(),
            vec!["sudo hostnamectl --static", "sudo hostnamectl --transient"]
        );
        assert_eq!(std::fs::read_to_string(&hosts).unwrap(), "127.0.0.1 localhost\n");
    }

    #[tokio::test]
    async fn test_unreadable_hosts_file() {
        let dir = TempDir::new().unwrap();
        let runner = FakeRunner::new().respond("hostnamectl --", "undercloud.example.com\n");
        let missing = dir.path().join("no-such-hosts");
        let err = check_hostname(&runner, &UndercloudConfig::default(), &missing, true)
            .await
            .unwrap_err();
        assert!(matches!(err, UndercloudError::Host(HostError::Inspection { .. })));
        assert!(!runner.command_lines().iter().any(|line| line.contains("sed")));

        let err = check_hostname(&runner, &UndercloudConfig::default(), dir.path(), true)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }

    #[test]
    fn test_memory_threshold() {
        assert!(check_memory(&facts(REQUIRED_MB)).is_ok());
        let err = check_memory(&facts(4096)).unwrap_err();
        assert!(err.to_string().contains("detected 4096 MB"));
    }

    #[test]
    fn test_sysctl_missing_options() {
        let dir = TempDir::new().unwrap();
        let mut paths = Paths::for_home(dir.path());
        paths.proc_root = dir.path().join("proc");
        let ipv4 = paths.proc("sys/net/ipv4");
        std::fs::create_dir_all(&ipv4).unwrap();
        std::fs::write(ipv4.join("ip_forward"), "1").unwrap();

        let err = check_sysctl(&paths).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Host check failed: Missing sysctl options: net.ipv4.ip_nonlocal_bind"
        );

        std::fs::write(ipv4.join("ip_nonlocal_bind"), "0").unwrap();
        check_sysctl(&paths).unwrap();

        std::fs::create_dir_all(paths.proc("net")).unwrap();
        std::fs::write(paths.proc("net/if_inet6"), "").unwrap();
        assert!(check_sysctl(&paths).is_err());
    }

    #[test]
    fn test_local_ip_change_refused() {
        let dir = TempDir::new().unwrap();
        let mut paths = Paths::for_home(dir.path());
        paths.os_net_config = dir.path().join("config.json");
        validate_no_ip_change(&paths, "192.168.24.1/24").unwrap();

        std::fs::write(
            &paths.os_net_config,
            r#"{"network_config": [{"name": "br-ctlplane", "type": "ovs_bridge",
                "addresses": [{"ip_netmask": "192.168.24.1/24"}]}]}"#,
        )
        .unwrap();
        validate_no_ip_change(&paths, "192.168.24.1/24").unwrap();
        let err = validate_no_ip_change(&paths, "10.0.0.1/24").unwrap_err();
        assert!(matches!(err, UndercloudError::Host(HostError::LocalIpChanged { .. })));

        std::fs::write(&paths.os_net_config, r#"{"network_config": []}"#).unwrap();
        validate_no_ip_change(&paths, "10.0.0.1/24").unwrap();
    }

    #[test]
    fn test_passwords_file_guard() {
        let dir = TempDir::new().unwrap();
        let paths = Paths::for_home(dir.path());
        validate_passwords_file(&paths).unwrap();

        std::fs::write(&paths.stackrc, "export OS_CLOUD=undercloud\n").unwrap();
        assert!(validate_passwords_file(&paths).is_err());

        std::fs::write(&paths.password_path, "[auth]\n").unwrap();
        validate_passwords_file(&paths).unwrap();
    }
}

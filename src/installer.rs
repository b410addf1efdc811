//! Install, upgrade and pre-upgrade flows.
//!
//! An install validates the host and configuration, generates the
//! environment and init data, runs the provisioning tool and the
//! config-refresh run, then reconciles the cloud. Every step runs to
//! completion before the next starts.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::{CFN_INIT_DATA, ConfigValidator, Paths, UndercloudConfig};
use crate::environment::{
    Environment, GeneratorInputs, generate, prepare_init_data, write_init_data, write_password_file,
};
use crate::error::{CommandError, ReconcileError, Result, UndercloudError};
use crate::host::{
    HostFacts, check_hostname, check_memory, check_sysctl, validate_no_ip_change,
    validate_passwords_file,
};
use crate::openstack::{CloudApi, CloudConnector};
use crate::process::{CommandRunner, RunOptions, argv};
use crate::reconciler::{
    Clock, ReconciliationReport, Reconciler, VALIDATION_TIMEOUT, run_validation_groups,
};
use crate::stackrc::{auth_credentials, copy_stackrc, upgrade_to_v3};

/// State directory of the config collection agent.
const OS_COLLECT_CONFIG: &str = "/var/lib/os-collect-config";

/// Service map left behind by the config-refresh run.
const SVC_MAP_SERVICES: &str = "/tmp/svc-map-services";

/// Bare-metal database sync log needing its ownership fixed on upgrade.
const IRONIC_DBSYNC_LOG: &str = "/var/log/ironic/ironic-dbsync.log";

/// Fact file telling puppet whether this run is an upgrade.
const UPGRADE_FACT: &str = "undercloud_upgrade.txt";

/// Marker of an OVS internal port in an interface script.
const OVS_INT_PORT: &str = "OVSIntPort";

/// Environment key holding the public workflow endpoint.
const WORKFLOW_ENDPOINT_KEY: &str = "UNDERCLOUD_ENDPOINT_MISTRAL_PUBLIC";

/// Validation group run after an upgrade.
const POST_UPGRADE_GROUP: &str = "post-upgrade";

/// Name of the operation for messages.
#[must_use]
pub const fn operation_name(upgrade: bool) -> &'static str {
    if upgrade { "upgrade" } else { "install" }
}

/// Banner logged after a successful install or upgrade.
#[must_use]
pub fn completion_message(operation: &str, paths: &Paths) -> String {
    format!(
        "\n#############################################################################\n\
         Undercloud {operation} complete.\n\n\
         The file containing this installation's passwords is at\n\
         {}.\n\n\
         There is also a stackrc file at {}.\n\n\
         These files are needed to interact with the OpenStack services, and should be\n\
         secured.\n\n\
         #############################################################################\n",
        paths.password_path.display(),
        paths.stackrc.display()
    )
}

/// Banner logged when an install or upgrade fails.
#[must_use]
pub fn failure_message(operation: &str, reason: &UndercloudError, log_file: &Path) -> String {
    format!(
        "\n#############################################################################\n\
         Undercloud {operation} failed.\n\n\
         Reason: {reason}\n\n\
         See the previous output for details about what went wrong.  The full install\n\
         log can be found at {}.\n\n\
         #############################################################################\n",
        log_file.display()
    )
}

/// Names of interfaces backed by OVS internal ports.
///
/// The name is taken from the script file name after its last `-`.
/// A missing directory yields no interfaces.
#[must_use]
pub fn ovs_interfaces(network_scripts: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(network_scripts) else {
        return Vec::new();
    };
    let mut interfaces: Vec<String> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with("ifcfg-"))
        })
        .filter(|path| {
            std::fs::read_to_string(path).is_ok_and(|text| text.contains(OVS_INT_PORT))
        })
        .filter_map(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy().rsplit('-').next().unwrap_or_default().to_string())
        })
        .collect();
    interfaces.sort();
    interfaces
}

fn is_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|byte| byte.is_ascii_digit())
}

/// `X.Y` of an `X.Y.Z` version, or the input when it has no such form.
#[must_use]
pub fn major_version(version: &str) -> &str {
    let mut parts = version.splitn(3, '.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(major), Some(minor), Some(_)) if is_digits(major) && is_digits(minor) => {
            &version[..=major.len() + minor.len()]
        }
        _ => version,
    }
}

/// True when the pending package update changes the database's major
/// version.
///
/// # Errors
///
/// Returns an error if a package query fails or a version is empty.
pub async fn database_upgrade_needed(runner: &dyn CommandRunner) -> Result<bool> {
    let query = |args: Vec<String>| async move {
        runner
            .run(&args, RunOptions::default())
            .await
            .map(|output| output.trim().to_string())
            .inspect_err(|_| error!("Could not determine if mariadb will be updated"))
    };
    let installed = query(argv(&[
        "sudo", "rpm", "--query", "--queryformat", "%{VERSION}", "mariadb-server",
    ]))
    .await?;
    info!("Current mariadb version is: {installed}");
    let available = query(argv(&[
        "sudo", "repoquery", "--pkgnarrow=updates", "--queryformat", "%{VERSION}", "mariadb-server",
    ]))
    .await?;
    if available.is_empty() {
        info!("Available mariadb version is: (no new version available)");
        return Ok(false);
    }
    info!("Available mariadb version is: {available}");

    let (major_installed, major_available) = (major_version(&installed), major_version(&available));
    if major_installed.is_empty() || major_available.is_empty() {
        return Err(UndercloudError::internal(format!(
            "Could not determine mariadb versions (installed:\"{major_installed}\", available:\"{major_available}\")"
        )));
    }
    let needed = major_installed != major_available;
    if needed {
        info!(
            "Major versions differ ({major_installed} vs {major_available}), database needs an upgrade"
        );
    }
    Ok(needed)
}

/// Inputs of an install besides the configuration.
#[derive(Debug, Clone, Copy)]
pub struct InstallRequest<'a> {
    /// Source checkout used when packaged data is not installed.
    pub root: &'a Path,
    /// Working directory of the invocation.
    pub cwd: &'a Path,
    /// Environment the generated one is seeded from.
    pub base: &'a BTreeMap<String, String>,
    /// True for an upgrade of an existing undercloud.
    pub upgrade: bool,
}

/// Outcome of a successful install.
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    /// `install` or `upgrade`.
    pub operation: &'static str,
    /// OVS interfaces restarted around the config-refresh run.
    pub ovs_interfaces: Vec<String>,
    /// Post-install reconciliation.
    pub reconciliation: ReconciliationReport,
}

/// Drives the install, upgrade and pre-upgrade flows.
pub struct Installer<'a> {
    config: &'a UndercloudConfig,
    paths: &'a Paths,
    facts: &'a HostFacts,
    runner: &'a dyn CommandRunner,
    connector: &'a dyn CloudConnector,
    clock: &'a dyn Clock,
}

impl<'a> Installer<'a> {
    /// Creates an installer.
    #[must_use]
    pub const fn new(
        config: &'a UndercloudConfig,
        paths: &'a Paths,
        facts: &'a HostFacts,
        runner: &'a dyn CommandRunner,
        connector: &'a dyn CloudConnector,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            config,
            paths,
            facts,
            runner,
            connector,
            clock,
        }
    }

    /// Checks the host and the configuration, fixing the hostname setup
    /// an install needs.
    ///
    /// # Errors
    ///
    /// Returns the first host or configuration violation.
    pub async fn validate(&self) -> Result<()> {
        self.preflight(true).await
    }

    /// Checks the host and the configuration without changing the host.
    ///
    /// # Errors
    ///
    /// Returns the first host or configuration violation.
    pub async fn check(&self) -> Result<()> {
        self.preflight(false).await
    }

    async fn preflight(&self, apply: bool) -> Result<()> {
        let checks = async {
            check_hostname(self.runner, self.config, &self.paths.hosts_file, apply).await?;
            check_memory(self.facts)?;
            check_sysctl(self.paths)?;
            ConfigValidator::new(&self.facts.interfaces).ensure_valid(self.config)?;
            validate_no_ip_change(self.paths, self.config.local_ip())?;
            validate_passwords_file(self.paths)
        };
        checks.await.inspect_err(|e| {
            error!(
                "An error occurred during configuration validation, please check your host \
                 configuration and try again. Error message: {e}"
            );
        })
    }

    /// Generates the install environment without changing the host.
    ///
    /// # Errors
    ///
    /// Returns any generation error.
    pub fn generate_environment(&self, request: &InstallRequest<'_>) -> Result<Environment> {
        generate(
            self.config,
            &GeneratorInputs {
                facts: self.facts,
                paths: self.paths,
                root: request.root,
                cwd: request.cwd,
                base: request.base,
            },
        )
    }

    /// Installs or upgrades the undercloud.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error. Validation errors are
    /// returned before anything on the host is changed.
    pub async fn install(&self, request: &InstallRequest<'_>) -> Result<InstallReport> {
        let upgrade = request.upgrade;
        self.clean_os_refresh_config().await?;
        self.runner
            .run(
                &argv(&["sudo", "rm", "-fr", OS_COLLECT_CONFIG]),
                RunOptions::named("Clean os-collect-config"),
            )
            .await?;
        self.validate().await?;

        let env = self.generate_environment(request)?;
        write_password_file(&self.paths.password_path, &env)?;
        let init_data = prepare_init_data(self.runner, self.config, &env, self.paths).await?;
        write_init_data(self.runner, &init_data, Path::new(CFN_INIT_DATA)).await?;
        let interfaces = ovs_interfaces(&self.paths.network_scripts);

        if upgrade {
            self.runner
                .run(
                    &argv(&["sudo", "/usr/bin/chown", "ironic:ironic", IRONIC_DBSYNC_LOG]),
                    RunOptions::default(),
                )
                .await?;
            self.remove_tuskar().await;
        }
        if self.config.flag("undercloud_update_packages") {
            self.run_live(&["sudo", "yum", "clean", "all"], Some(&env), "yum-clean-all")
                .await?;
            self.restore_ovs_interfaces(&interfaces).await?;
            self.run_live(&["sudo", "yum", "update", "-y"], Some(&env), "yum-update")
                .await?;
        }
        self.handle_upgrade_fact(upgrade).await?;

        let elements_path = env.get("ELEMENTS_PATH").unwrap_or_default().to_string();
        let json_file = env.get("JSONFILE").unwrap_or_default().to_string();
        self.run_live(
            &["sudo", "-E", "instack", "-p", &elements_path, "-j", &json_file],
            Some(&env),
            "instack",
        )
        .await?;
        self.run_live(&["sudo", "os-refresh-config"], Some(&env), "os-refresh-config")
            .await?;
        self.restore_ovs_interfaces(&interfaces).await?;

        let (reconciliation, cloud) = self.post_config(&env, upgrade).await?;
        self.runner
            .run(&argv(&["sudo", "rm", "-f", SVC_MAP_SERVICES]), RunOptions::named("rm"))
            .await?;
        if upgrade && self.config.flag("enable_validations") {
            run_validation_groups(
                cloud.as_ref(),
                self.clock,
                &[POST_UPGRADE_GROUP],
                VALIDATION_TIMEOUT,
                false,
            )
            .await?;
        }

        Ok(InstallReport {
            operation: operation_name(upgrade),
            ovs_interfaces: interfaces,
            reconciliation,
        })
    }

    /// Prepares an existing undercloud for an upgrade.
    ///
    /// Refuses to continue unless every stack is complete.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::StacksNotComplete`] or the first failing
    /// step's error.
    pub async fn pre_upgrade(&self) -> Result<()> {
        upgrade_to_v3(&self.paths.stackrc)?;

        let credentials = auth_credentials(self.runner, self.paths).await?;
        let cloud = self.connector.connect(&credentials, None).await?;
        let incomplete: Vec<String> = cloud
            .list_stacks()
            .await?
            .into_iter()
            .filter(|stack| stack.status() != "COMPLETE")
            .map(|stack| stack.stack_name)
            .collect();
        if !incomplete.is_empty() {
            error!("Can not upgrade undercloud with FAILED overcloud");
            return Err(ReconcileError::StacksNotComplete { stacks: incomplete }.into());
        }

        info!("Stopping OpenStack and related services");
        self.run_live(
            &["sudo", "systemctl", "stop", "openstack-*", "neutron-*", "openvswitch", "httpd"],
            None,
            "systemctl stop",
        )
        .await?;

        info!("Running Nova online data migration");
        self.runner
            .run(
                &argv(&["sudo", "-E", "/usr/bin/nova-manage", "db", "online_data_migrations"]),
                RunOptions::default(),
            )
            .await?;
        info!("Nova online data migration completed");

        self.run_live(
            &["sudo", "yum", "install", "-y", "ansible-pacemaker"],
            None,
            "install ansible",
        )
        .await?;

        let mariadb_upgrade = database_upgrade_needed(self.runner).await?;
        if mariadb_upgrade {
            self.run_live(&["sudo", "systemctl", "stop", "mariadb"], None, "systemctl stop mariadb")
                .await?;
        }
        self.run_live(&["sudo", "yum", "update", "-y"], None, "yum update")
            .await?;
        if mariadb_upgrade {
            self.run_live(&["sudo", "systemctl", "start", "mariadb"], None, "systemctl start mariadb")
                .await?;
            self.run_live(&["sudo", "mysql_upgrade"], None, "mysql_upgrade")
                .await?;
            self.run_live(
                &["sudo", "systemctl", "restart", "mariadb"],
                None,
                "systemctl restart mariadb",
            )
            .await?;
        }
        Ok(())
    }

    async fn run_live(&self, args: &[&str], env: Option<&Environment>, name: &str) -> Result<()> {
        info!("Running {name}");
        self.runner
            .run_live(
                &argv(args),
                RunOptions {
                    env: env.map(Environment::as_map),
                    name: Some(name),
                },
            )
            .await?;
        info!("{name} completed successfully");
        Ok(())
    }

    async fn clean_os_refresh_config(&self) -> Result<()> {
        let mut args = argv(&["sudo", "rm", "-rf"]);
        if let Ok(entries) = std::fs::read_dir(&self.paths.os_refresh_config) {
            let mut scripts: Vec<String> = entries
                .filter_map(std::result::Result::ok)
                .map(|entry| entry.path().display().to_string())
                .collect();
            scripts.sort();
            args.extend(scripts);
        }
        self.runner
            .run(&args, RunOptions::named("Clean os-refresh-config"))
            .await?;
        Ok(())
    }

    async fn remove_tuskar(&self) {
        let removal = self
            .runner
            .run(&argv(&["sudo", "yum", "remove", "-y", "*tuskar*"]), RunOptions::default())
            .await;
        if let Err(UndercloudError::Command(CommandError::Failed { output, .. })) = removal {
            error!("Error with tuskar removal task {output} - continuing");
        } else if let Err(e) = removal {
            error!("Error with tuskar removal task {e} - continuing");
        }
    }

    async fn handle_upgrade_fact(&self, upgrade: bool) -> Result<()> {
        let facts_dir = &self.paths.facts_dir;
        if upgrade && !facts_dir.exists() {
            let dir = facts_dir.display().to_string();
            self.runner
                .run(&argv(&["sudo", "mkdir", "-p", &dir]), RunOptions::default())
                .await?;
        }
        // Only an installed undercloud has the directory.
        if !facts_dir.exists() {
            return Ok(());
        }

        let staging = std::env::temp_dir().join(format!("undercloud-fact-{}", Uuid::new_v4()));
        std::fs::write(&staging, format!("undercloud_upgrade={upgrade}"))?;
        let staging = staging.display().to_string();
        let fact_path = facts_dir.join(UPGRADE_FACT).display().to_string();
        self.runner
            .run(&argv(&["sudo", "mv", &staging, &fact_path]), RunOptions::default())
            .await?;
        self.runner
            .run(&argv(&["sudo", "chmod", "0644", &fact_path]), RunOptions::default())
            .await?;
        Ok(())
    }

    async fn restore_ovs_interfaces(&self, interfaces: &[String]) -> Result<()> {
        for interface in interfaces {
            info!("Running restart OVS interface {interface}");
            self.runner
                .run(&argv(&["sudo", "ifup", interface]), RunOptions::default())
                .await?;
            info!("Restart OVS interface {interface} completed successfully");
        }
        Ok(())
    }

    async fn post_config(
        &self,
        env: &Environment,
        upgrade: bool,
    ) -> Result<(ReconciliationReport, Arc<dyn CloudApi>)> {
        copy_stackrc(self.runner, self.paths, &self.facts.user).await?;
        let credentials = auth_credentials(self.runner, self.paths).await?;
        let cloud = self
            .connector
            .connect(&credentials, env.get(WORKFLOW_ENDPOINT_KEY))
            .await?;
        let report = Reconciler::new(self.config, cloud.as_ref(), self.runner, env, self.paths, self.clock)
            .reconcile(upgrade)
            .await?;
        Ok((report, cloud))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openstack::testing::{FakeCloud, FakeConnector};
    use crate::openstack::types::Stack;
    use crate::process::testing::FakeRunner;
    use crate::reconciler::poll::testing::FakeClock;
    use tempfile::TempDir;

    struct Host {
        dir: TempDir,
        paths: Paths,
        facts: HostFacts,
    }

    fn host() -> Host {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let mut paths = Paths::for_home(root.join("home"));
        paths.hosts_file = root.join("hosts");
        paths.proc_root = root.join("proc");
        paths.os_release = root.join("os-release");
        paths.os_net_config = root.join("os-net-config.json");
        paths.network_scripts = root.join("network-scripts");
        paths.instack_share = root.join("instack");
        paths.puppet_elements_share = root.join("puppet-elements");
        paths.os_refresh_config = root.join("orc");
        paths.facts_dir = root.join("facts.d");
        paths.workbook_dir = root.join("workbooks");

        std::fs::create_dir_all(&paths.home).unwrap();
        std::fs::write(&paths.hosts_file, "127.0.0.1 localhost undercloud.example.com\n").unwrap();
        let ipv4 = paths.proc("sys/net/ipv4");
        std::fs::create_dir_all(&ipv4).unwrap();
        std::fs::write(ipv4.join("ip_forward"), "1").unwrap();
        std::fs::write(ipv4.join("ip_nonlocal_bind"), "0").unwrap();
        std::fs::create_dir_all(&paths.network_scripts).unwrap();
        std::fs::write(paths.network_scripts.join("ifcfg-eth0"), "TYPE=Ethernet\n").unwrap();
        std::fs::write(
            paths.network_scripts.join("ifcfg-vlan10"),
            "DEVICETYPE=ovs\nTYPE=OVSIntPort\n",
        )
        .unwrap();
        std::fs::create_dir_all(&paths.os_refresh_config).unwrap();
        std::fs::create_dir_all(paths.os_refresh_config.join("configure.d")).unwrap();
        std::fs::create_dir_all(&paths.workbook_dir).unwrap();
        std::fs::write(paths.workbook_dir.join("plan.yaml"), "name: tripleo.plan\n").unwrap();
        std::fs::create_dir_all(paths.home.join(".ssh")).unwrap();
        std::fs::write(paths.ssh_private_key(), "private").unwrap();
        std::fs::write(paths.ssh_public_key(), "ssh-rsa AAAA\n").unwrap();
        std::fs::write(
            &paths.stackrc,
            "OS_USERNAME=admin\nOS_PROJECT_NAME=admin\nOS_AUTH_URL=https://192.168.24.2:13000/\n",
        )
        .unwrap();
        std::fs::write(&paths.password_path, "[auth]\n").unwrap();

        let facts = HostFacts {
            hostname: "undercloud.example.com".to_string(),
            distribution: "CentOS Linux".to_string(),
            interfaces: vec!["eth0".to_string(), "eth1".to_string()],
            total_memory_mb: 16384,
            ipv6_enabled: false,
            user: "stack".to_string(),
        };
        Host { dir, paths, facts }
    }

    fn runner() -> FakeRunner {
        FakeRunner::new()
            .respond("hostnamectl --", "undercloud.example.com\n")
            .respond("hiera", "secret\n")
            .missing("getenforce")
            .fail("tuskar", 1)
    }

    #[tokio::test]
    async fn test_install_runs_steps_in_order() {
        let host = host();
        let config = UndercloudConfig::default();
        let runner = runner();
        let connector = FakeConnector::new(Arc::new(FakeCloud::new()));
        let clock = FakeClock::new();
        let installer = Installer::new(&config, &host.paths, &host.facts, &runner, &connector, &clock);
        let base = BTreeMap::new();
        let request = InstallRequest {
            root: host.dir.path(),
            cwd: host.dir.path(),
            base: &base,
            upgrade: false,
        };

        let report = installer.install(&request).await.unwrap();
        assert_eq!(report.operation, "install");
        assert_eq!(report.ovs_interfaces, vec!["vlan10"]);
        assert_eq!(report.reconciliation.subnets.created, vec!["ctlplane-subnet"]);
        let passwords = std::fs::read_to_string(&host.paths.password_path).unwrap();
        assert!(passwords.contains("undercloud_db_password"));

        let lines = runner.command_lines();
        let orc = host.paths.os_refresh_config.display();
        assert_eq!(lines[0], format!("sudo rm -rf {orc}/configure.d"));
        assert_eq!(lines[1], "sudo rm -fr /var/lib/os-collect-config");
        let position = |prefix: &str| {
            lines
                .iter()
                .position(|line| line.starts_with(prefix))
                .unwrap_or_else(|| panic!("{prefix} not run"))
        };
        assert!(position("sudo yum clean all") < position("sudo yum update -y"));
        assert!(position("sudo yum update -y") < position("sudo -E instack -p"));
        assert!(position("sudo -E instack -p") < position("sudo os-refresh-config"));
        assert!(position("sudo os-refresh-config") < position("sudo cp /root/stackrc"));
        assert_eq!(lines.iter().filter(|line| *line == "sudo ifup vlan10").count(), 2);
        assert_eq!(lines.last().unwrap(), "sudo rm -f /tmp/svc-map-services");
        assert!(!lines.iter().any(|line| line.contains("tuskar")));
        assert!(!lines.iter().any(|line| line.contains(UPGRADE_FACT)));

        let connections = connector.connections.lock().unwrap();
        assert_eq!(connections[0].0.password, "secret");
        assert_eq!(connections[0].1.as_deref(), Some("http://192.168.24.1:8989/v2"));
    }

    #[tokio::test]
    async fn test_upgrade_migrates_and_validates() {
        let host = host();
        std::fs::create_dir_all(&host.paths.facts_dir).unwrap();
        let mut config = UndercloudConfig::default();
        config.set_option("undercloud_update_packages", "false").unwrap();
        let runner = runner();
        let cloud = Arc::new(FakeCloud::new());
        cloud.state().stacks = vec![Stack {
            id: "s1".to_string(),
            stack_name: "overcloud".to_string(),
            stack_status: "UPDATE_COMPLETE".to_string(),
        }];
        let connector = FakeConnector::new(cloud.clone());
        let clock = FakeClock::new();
        let installer = Installer::new(&config, &host.paths, &host.facts, &runner, &connector, &clock);
        let base = BTreeMap::new();
        let request = InstallRequest {
            root: host.dir.path(),
            cwd: host.dir.path(),
            base: &base,
            upgrade: true,
        };

        let report = installer.install(&request).await.unwrap();
        assert_eq!(report.operation, "upgrade");
        assert_eq!(report.reconciliation.stacks_migrated, vec!["s1"]);

        let lines = runner.command_lines();
        assert!(lines.contains(&"sudo /usr/bin/chown ironic:ironic /var/log/ironic/ironic-dbsync.log".to_string()));
        assert!(lines.contains(&"sudo yum remove -y *tuskar*".to_string()));
        assert!(!lines.iter().any(|line| line.starts_with("sudo yum update")));
        let fact = host.paths.facts_dir.join(UPGRADE_FACT).display().to_string();
        assert!(lines.contains(&format!("sudo chmod 0644 {fact}")));

        let state = cloud.state();
        let (workflow, input) = state.executions.last().unwrap();
        assert_eq!(workflow, "tripleo.validations.v1.run_groups");
        assert_eq!(input["group_names"][0], "post-upgrade");
    }

    #[tokio::test]
    async fn test_validation_failure_stops_before_changes() {
        let host = host();
        let config = UndercloudConfig::default();
        let runner = FakeRunner::new().respond("hostnamectl --static", "a.example.com\n");
        let connector = FakeConnector::default();
        let clock = FakeClock::new();
        let installer = Installer::new(&config, &host.paths, &host.facts, &runner, &connector, &clock);
        let base = BTreeMap::new();
        let request = InstallRequest {
            root: host.dir.path(),
            cwd: host.dir.path(),
            base: &base,
            upgrade: false,
        };

        let err = installer.install(&request).await.unwrap_err();
        assert!(matches!(err, UndercloudError::Host(_) | UndercloudError::Config(_)));
        assert!(!runner.command_lines().iter().any(|line| line.contains("instack")));
        assert_eq!(std::fs::read_to_string(&host.paths.password_path).unwrap(), "[auth]\n");
    }

    #[tokio::test]
    async fn test_generate_environment_keeps_password_guard() {
        let host = host();
        std::fs::remove_file(&host.paths.password_path).unwrap();
        assert!(validate_passwords_file(&host.paths).is_err());

        let config = UndercloudConfig::default();
        let runner = runner();
        let connector = FakeConnector::default();
        let clock = FakeClock::new();
        let installer = Installer::new(&config, &host.paths, &host.facts, &runner, &connector, &clock);
        let base = BTreeMap::new();
        let request = InstallRequest {
            root: host.dir.path(),
            cwd: host.dir.path(),
            base: &base,
            upgrade: false,
        };

        let env = installer.generate_environment(&request).unwrap();
        assert_eq!(env.get("UNDERCLOUD_DB_PASSWORD").map(str::len), Some(40));
        assert!(!host.paths.password_path.exists());
        assert!(validate_passwords_file(&host.paths).is_err());
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_check_leaves_host_alone() {
        let host = host();
        std::fs::write(&host.paths.hosts_file, "127.0.0.1 localhost\n").unwrap();
        let mut config = UndercloudConfig::default();
        config
            .set_option("undercloud_hostname", "undercloud.example.com")
            .unwrap();
        let runner = runner();
        let connector = FakeConnector::default();
        let clock = FakeClock::new();
        let installer = Installer::new(&config, &host.paths, &host.facts, &runner, &connector, &clock);

        installer.check().await.unwrap();
        assert!(
            !runner
                .command_lines()
                .iter()
                .any(|line| line.contains("set-hostname") || line.contains("sed"))
        );
        assert_eq!(
            std::fs::read_to_string(&host.paths.hosts_file).unwrap(),
            "127.0.0.1 localhost\n"
        );
    }

    #[tokio::test]
    async fn test_pre_upgrade_with_database_major_upgrade() {
        let host = host();
        std::fs::write(
            &host.paths.stackrc,
            "OS_USERNAME=admin\nOS_AUTH_URL=http://192.168.24.1:5000/v2.0\nOS_TENANT_NAME=admin\n",
        )
        .unwrap();
        let config = UndercloudConfig::default();
        let runner = FakeRunner::new()
            .respond("hiera", "secret\n")
            .respond("rpm --query", "5.5.56\n")
            .respond("repoquery", "10.1.20\n");
        let connector = FakeConnector::default();
        let clock = FakeClock::new();
        let installer = Installer::new(&config, &host.paths, &host.facts, &runner, &connector, &clock);

        installer.pre_upgrade().await.unwrap();
        let stackrc = std::fs::read_to_string(&host.paths.stackrc).unwrap();
        assert!(stackrc.contains("OS_PROJECT_NAME=admin"));
        assert_eq!(
            connector.connections.lock().unwrap()[0].0.auth_url,
            "http://192.168.24.1:5000/"
        );

        let lines = runner.command_lines();
        let tail: Vec<&str> = lines[lines.len() - 5..].iter().map(String::as_str).collect();
        assert_eq!(
            tail,
            vec![
                "sudo systemctl stop mariadb",
                "sudo yum update -y",
                "sudo systemctl start mariadb",
                "sudo mysql_upgrade",
                "sudo systemctl restart mariadb",
            ]
        );
    }

    #[tokio::test]
    async fn test_pre_upgrade_refuses_failed_stack() {
        let host = host();
        let config = UndercloudConfig::default();
        let runner = FakeRunner::new().respond("hiera", "secret\n");
        let connector = FakeConnector::default();
        connector.cloud.state().stacks = vec![Stack {
            id: "s1".to_string(),
            stack_name: "overcloud".to_string(),
            stack_status: "UPDATE_FAILED".to_string(),
        }];
        let clock = FakeClock::new();
        let installer = Installer::new(&config, &host.paths, &host.facts, &runner, &connector, &clock);

        let err = installer.pre_upgrade().await.unwrap_err();
        assert!(matches!(
            err,
            UndercloudError::Reconcile(ReconcileError::StacksNotComplete { ref stacks }) if stacks == &["overcloud"]
        ));
        assert!(!runner.command_lines().iter().any(|line| line.contains("systemctl")));
    }

    #[tokio::test]
    async fn test_database_versions() {
        assert_eq!(major_version("5.5.56"), "5.5");
        assert_eq!(major_version("10.1.20"), "10.1");
        assert_eq!(major_version("10"), "10");

        let same = FakeRunner::new()
            .respond("rpm --query", "10.1.20")
            .respond("repoquery", "10.1.22");
        assert!(!database_upgrade_needed(&same).await.unwrap());
        let none = FakeRunner::new().respond("rpm --query", "10.1.20");
        assert!(!database_upgrade_needed(&none).await.unwrap());
    }

    #[test]
    fn test_messages() {
        let paths = Paths::for_home("/home/stack");
        let done = completion_message("install", &paths);
        assert!(done.contains("Undercloud install complete."));
        assert!(done.contains("/home/stack/undercloud-passwords.conf."));
        let failed = failure_message(
            "upgrade",
            &UndercloudError::internal("boom"),
            &paths.log_file,
        );
        assert!(failed.contains("Undercloud upgrade failed."));
        assert!(failed.contains("Reason: Internal error: boom"));
        assert!(failed.contains("/home/stack/.instack/install-undercloud.log."));
    }
}

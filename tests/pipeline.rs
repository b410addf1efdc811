//! Configuration loading, validation and environment generation run end
//! to end against files on disk.

use std::collections::BTreeMap;

use tempfile::TempDir;
use undercloud_installer::config::{ConfigParser, ConfigValidator, Paths, UndercloudConfig};
use undercloud_installer::environment::{
    Environment, GeneratorInputs, generate, write_password_file,
};
use undercloud_installer::host::HostFacts;

struct Host {
    dir: TempDir,
    paths: Paths,
    facts: HostFacts,
}

impl Host {
    fn new(conf: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let mut paths = Paths::for_home(dir.path());
        paths.instack_share = dir.path().join("missing-instack");
        paths.puppet_elements_share = dir.path().join("missing-puppet");
        std::fs::write(&paths.conf_path, conf).unwrap();
        let facts = HostFacts {
            hostname: "undercloud.localdomain".to_string(),
            distribution: "CentOS Linux".to_string(),
            interfaces: vec!["eth0".to_string(), "eth1".to_string()],
            total_memory_mb: 16384,
            ipv6_enabled: false,
            user: "stack".to_string(),
        };
        Self { dir, paths, facts }
    }

    fn load(&self) -> UndercloudConfig {
        ConfigParser::new(&self.paths.conf_path, &self.paths.password_path)
            .load()
            .unwrap()
    }

    fn generate(&self, config: &UndercloudConfig) -> Environment {
        let root = self.dir.path().join("src");
        let base = BTreeMap::new();
        let inputs = GeneratorInputs {
            facts: &self.facts,
            paths: &self.paths,
            root: &root,
            cwd: self.dir.path(),
            base: &base,
        };
        let env = generate(config, &inputs).unwrap();
        write_password_file(&self.paths.password_path, &env).unwrap();
        env
    }
}

#[test]
fn test_install_environment_from_files() {
    let host = Host::new(
        "[DEFAULT]\n\
         local_ip = 10.0.0.1/24\n\
         undercloud_public_host = 10.0.0.2\n\
         undercloud_admin_host = 10.0.0.3\n\
         local_interface = eth1\n\
         local_subnet = ctlplane-subnet\n\
         [ctlplane-subnet]\n\
         cidr = 10.0.0.0/24\n\
         dhcp_start = 10.0.0.5\n\
         dhcp_end = 10.0.0.24\n\
         inspection_iprange = 10.0.0.100,10.0.0.120\n\
         gateway = 10.0.0.1\n",
    );
    let config = host.load();
    let report = ConfigValidator::new(&host.facts.interfaces).validate(&config);
    assert!(report.is_valid(), "{:?}", report.errors);

    let env = host.generate(&config);
    assert_eq!(env.get("LOCAL_IP"), Some("10.0.0.1"));
    assert_eq!(env.get("PUBLIC_INTERFACE_IP"), Some("10.0.0.1/24"));
    assert_eq!(
        env.get("UNDERCLOUD_ENDPOINT_KEYSTONE_PUBLIC"),
        Some("http://10.0.0.1:5000")
    );
    assert!(host.paths.password_path.is_file());
}

#[test]
fn test_secrets_survive_a_second_run() {
    let host = Host::new("[DEFAULT]\nlocal_interface = eth1\n");
    let first = host.generate(&host.load());
    let second = host.generate(&host.load());
    let secret = first.get("UNDERCLOUD_DB_PASSWORD");
    assert_eq!(secret.map(str::len), Some(40));
    assert_eq!(second.get("UNDERCLOUD_DB_PASSWORD"), secret);
    assert_eq!(
        second.get("UNDERCLOUD_HEAT_ENCRYPTION_KEY"),
        first.get("UNDERCLOUD_HEAT_ENCRYPTION_KEY")
    );
}

#[test]
fn test_invalid_configuration_is_reported() {
    let host = Host::new(
        "[DEFAULT]\n\
         local_interface = eth9\n\
         subnets = ctlplane-subnet,subnet1\n",
    );
    let config = host.load();
    let report = ConfigValidator::new(&host.facts.interfaces).validate(&config);
    assert!(!report.is_valid());
    assert!(
        report
            .errors
            .iter()
            .any(|message| message.starts_with("Multiple subnets specified"))
    );
    assert!(report.errors.iter().any(|message| message.contains("eth9")));
}

//! Filesystem locations used by the installer.

use std::path::{Path, PathBuf};

/// Default location of the heat-cfntools init data.
pub const CFN_INIT_DATA: &str = "/var/lib/heat-cfntools/cfn-init-data";

/// Directory holding the workflow workbooks shipped with tripleo-common.
pub const WORKBOOK_DIR: &str = "/usr/share/openstack-tripleo-common/workbooks";

/// Paths the installer reads and writes.
///
/// Home-relative files default to the invoking user's home directory;
/// system files default to their usual locations and can be redirected
/// for tests.
#[derive(Debug, Clone)]
pub struct Paths {
    /// The invoking user's home directory.
    pub home: PathBuf,
    /// `undercloud.conf`.
    pub conf_path: PathBuf,
    /// Persisted secrets file.
    pub password_path: PathBuf,
    /// Client credentials file written by the config-refresh run.
    pub stackrc: PathBuf,
    /// Install log.
    pub log_file: PathBuf,
    /// Workflow workbooks directory.
    pub workbook_dir: PathBuf,
    /// `/etc/hosts`.
    pub hosts_file: PathBuf,
    /// Root of procfs.
    pub proc_root: PathBuf,
    /// Distribution identification file.
    pub os_release: PathBuf,
    /// Network configuration written by a previous install.
    pub os_net_config: PathBuf,
    /// Directory scanned for OVS interface scripts.
    pub network_scripts: PathBuf,
    /// Installed instack-undercloud data directory.
    pub instack_share: PathBuf,
    /// Installed tripleo-puppet-elements directory.
    pub puppet_elements_share: PathBuf,
    /// Config-refresh script directory, emptied before each run.
    pub os_refresh_config: PathBuf,
    /// Directory of static facter facts.
    pub facts_dir: PathBuf,
}

impl Paths {
    /// Paths rooted at the given home directory.
    #[must_use]
    pub fn for_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            conf_path: home.join("undercloud.conf"),
            password_path: home.join("undercloud-passwords.conf"),
            stackrc: home.join("stackrc"),
            log_file: home.join(".instack").join("install-undercloud.log"),
            workbook_dir: PathBuf::from(WORKBOOK_DIR),
            hosts_file: PathBuf::from("/etc/hosts"),
            proc_root: PathBuf::from("/proc"),
            os_release: PathBuf::from("/etc/os-release"),
            os_net_config: PathBuf::from("/etc/os-net-config/config.json"),
            network_scripts: PathBuf::from("/etc/sysconfig/network-scripts"),
            instack_share: PathBuf::from("/usr/share/instack-undercloud"),
            puppet_elements_share: PathBuf::from("/usr/share/tripleo-puppet-elements"),
            os_refresh_config: PathBuf::from("/usr/libexec/os-refresh-config"),
            facts_dir: PathBuf::from("/etc/facter/facts.d"),
            home,
        }
    }

    /// Paths for the current user.
    #[must_use]
    pub fn detect() -> Self {
        Self::for_home(dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Overrides the configuration file location.
    #[must_use]
    pub fn with_conf_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.conf_path = path.into();
        self
    }

    /// Location of the user's SSH public key.
    #[must_use]
    pub fn ssh_public_key(&self) -> PathBuf {
        self.home.join(".ssh").join("id_rsa.pub")
    }

    /// Location of the user's SSH private key.
    #[must_use]
    pub fn ssh_private_key(&self) -> PathBuf {
        self.home.join(".ssh").join("id_rsa")
    }

    /// A file under procfs, e.g. `sys/net/ipv4/ip_forward`.
    #[must_use]
    pub fn proc(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.proc_root.join(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_relative_paths() {
        let paths = Paths::for_home("/home/stack");
        assert_eq!(paths.conf_path, PathBuf::from("/home/stack/undercloud.conf"));
        assert_eq!(
            paths.log_file,
            PathBuf::from("/home/stack/.instack/install-undercloud.log")
        );
        assert_eq!(paths.ssh_public_key(), PathBuf::from("/home/stack/.ssh/id_rsa.pub"));
        assert_eq!(paths.proc("net/if_inet6"), PathBuf::from("/proc/net/if_inet6"));
    }

    #[test]
    fn test_conf_override() {
        let paths = Paths::for_home("/home/stack").with_conf_path("/tmp/other.conf");
        assert_eq!(paths.conf_path, PathBuf::from("/tmp/other.conf"));
        assert_eq!(paths.stackrc, PathBuf::from("/home/stack/stackrc"));
    }
}

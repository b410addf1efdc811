//! SSH identity of the deploying user.
//!
//! The user's key is uploaded as the `default` keypair so deployed nodes
//! accept it, and `~/.ssh` gets the SELinux context sshd expects.

use std::io::ErrorKind;
use tracing::{debug, info};

use crate::config::Paths;
use crate::error::{CommandError, Result, UndercloudError};
use crate::openstack::ComputeApi;
use crate::process::{CommandRunner, RunOptions, argv};

/// Name of the keypair holding the user's key.
pub const DEFAULT_KEYPAIR: &str = "default";

/// SELinux type sshd requires on `~/.ssh`.
const SSH_HOME_TYPE: &str = "ssh_home_t";

/// Generates `~/.ssh/id_rsa` if it does not exist.
///
/// # Errors
///
/// Returns an error if `ssh-keygen` fails.
pub async fn ensure_user_identity(runner: &dyn CommandRunner, paths: &Paths) -> Result<bool> {
    let id_path = paths.ssh_private_key();
    if id_path.is_file() {
        return Ok(false);
    }
    let id_path = id_path.display().to_string();
    runner
        .run(
            &argv(&["ssh-keygen", "-t", "rsa", "-N", "", "-f", &id_path]),
            RunOptions::default(),
        )
        .await?;
    info!("Generated new ssh key in ~/.ssh/id_rsa");
    Ok(true)
}

/// Uploads the user's public key as the `default` keypair if absent.
///
/// # Errors
///
/// Returns an error if the key cannot be generated or read, or any API
/// error.
pub async fn configure_ssh_keys<C: ComputeApi + ?Sized>(
    compute: &C,
    runner: &dyn CommandRunner,
    paths: &Paths,
) -> Result<bool> {
    ensure_user_identity(runner, paths).await?;

    if compute.get_keypair(DEFAULT_KEYPAIR).await?.is_some() {
        debug!("Keypair {DEFAULT_KEYPAIR} already exists");
        return Ok(false);
    }
    let public_key = std::fs::read_to_string(paths.ssh_public_key())?;
    compute
        .create_keypair(DEFAULT_KEYPAIR, public_key.trim_end())
        .await?;
    info!("Created keypair {DEFAULT_KEYPAIR}");
    Ok(true)
}

/// Relabels `~/.ssh` when SELinux is enforcing and any entry lacks the
/// sshd home type.
///
/// # Errors
///
/// Returns command failures other than a missing `getenforce`.
pub async fn ensure_ssh_selinux_permission(runner: &dyn CommandRunner, paths: &Paths) -> Result<bool> {
    let enforcing = match runner.run(&argv(&["getenforce"]), RunOptions::default()).await {
        Ok(output) => output,
        Err(UndercloudError::Command(CommandError::Spawn { ref source, .. }))
            if source.kind() == ErrorKind::NotFound =>
        {
            debug!("Not a SeLinux platform");
            return Ok(false);
        }
        Err(e) => return Err(e),
    };

    let ssh_dir = paths.home.join(".ssh");
    if !ssh_dir.is_dir() || !enforcing.contains("Enforcing") {
        return Ok(false);
    }
    let ssh_dir = ssh_dir.display().to_string();
    let listing = runner
        .run(
            &argv(&["find", &ssh_dir, "-exec", "ls", "-lZ", "{}", ";"]),
            RunOptions::default(),
        )
        .await?;
    if listing.lines().all(|line| line.contains(SSH_HOME_TYPE)) {
        return Ok(false);
    }

    let pattern = format!("{ssh_dir}(/.*)?");
    runner
        .run(
            &argv(&["sudo", "semanage", "fcontext", "-a", "-t", SSH_HOME_TYPE, &pattern]),
            RunOptions::default(),
        )
        .await?;
    runner
        .run(&argv(&["restorecon", "-R", &ssh_dir]), RunOptions::default())
        .await?;
    info!("Restored SELinux context on {ssh_dir}");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openstack::testing::FakeCloud;
    use crate::openstack::types::Keypair;
    use crate::process::testing::FakeRunner;
    use tempfile::TempDir;

    fn home_with_key() -> (TempDir, Paths) {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".ssh")).unwrap();
        std::fs::write(dir.path().join(".ssh/id_rsa"), "private").unwrap();
        std::fs::write(dir.path().join(".ssh/id_rsa.pub"), "ssh-rsa AAAA stack@undercloud\n").unwrap();
        let paths = Paths::for_home(dir.path());
        (dir, paths)
    }

    #[tokio::test]
    async fn test_generates_missing_identity() {
        let dir = TempDir::new().unwrap();
        let paths = Paths::for_home(dir.path());
        let runner = FakeRunner::new();
        assert!(ensure_user_identity(&runner, &paths).await.unwrap());
        assert_eq!(
            runner.command_lines(),
            vec![format!("ssh-keygen -t rsa -N  -f {}", dir.path().join(".ssh/id_rsa").display())]
        );
    }

    #[tokio::test]
    async fn test_uploads_public_key_once() {
        let (_dir, paths) = home_with_key();
        let cloud = FakeCloud::new();
        let runner = FakeRunner::new();

        assert!(configure_ssh_keys(&cloud, &runner, &paths).await.unwrap());
        assert_eq!(
            cloud.state().keypairs,
            vec![Keypair {
                name: "default".to_string(),
                public_key: "ssh-rsa AAAA stack@undercloud".to_string(),
            }]
        );
        assert!(!configure_ssh_keys(&cloud, &runner, &paths).await.unwrap());
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_selinux_missing_is_ignored() {
        let (_dir, paths) = home_with_key();
        let runner = FakeRunner::new().missing("getenforce");
        assert!(!ensure_ssh_selinux_permission(&runner, &paths).await.unwrap());
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_selinux_relabels_wrong_context() {
        let (dir, paths) = home_with_key();
        let runner = FakeRunner::new()
            .respond("getenforce", "Enforcing\n")
            .respond(
                "find",
                "-rw-------. stack stack unconfined_u:object_r:ssh_home_t:s0 id_rsa\n\
                 -rw-r--r--. stack stack unconfined_u:object_r:user_home_t:s0 id_rsa.pub\n",
            );
        assert!(ensure_ssh_selinux_permission(&runner, &paths).await.unwrap());

        let ssh_dir = dir.path().join(".ssh").display().to_string();
        let lines = runner.command_lines();
        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[2],
            format!("sudo semanage fcontext -a -t ssh_home_t {ssh_dir}(/.*)?")
        );
        assert_eq!(lines[3], format!("restorecon -R {ssh_dir}"));
    }

    #[tokio::test]
    async fn test_selinux_permissive_untouched() {
        let (_dir, paths) = home_with_key();
        let runner = FakeRunner::new().respond("getenforce", "Permissive\n");
        assert!(!ensure_ssh_selinux_permission(&runner, &paths).await.unwrap());
        assert_eq!(runner.calls().len(), 1);
    }
}

//! Client credentials file handling.
//!
//! The config-refresh run writes `/root/stackrc`; the installer copies it
//! to the user's home, reads the admin credentials from it, and on upgrade
//! rewrites identity v2 settings to v3.

use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::config::Paths;
use crate::error::{CommandError, Result, UndercloudError};
use crate::openstack::Credentials;
use crate::process::{CommandRunner, RunOptions, argv};

/// Location the config-refresh run writes the credentials file to.
pub const ROOT_STACKRC: &str = "/root/stackrc";

/// Lines appended after a rewritten v2 `OS_AUTH_URL`.
const V3_SETTINGS: [&str; 6] = [
    "OS_IDENTITY_API_VERSION='3'",
    "export OS_IDENTITY_API_VERSION",
    "OS_PROJECT_DOMAIN_NAME='Default'",
    "export OS_PROJECT_DOMAIN_NAME",
    "OS_USER_DOMAIN_NAME='Default'",
    "export OS_USER_DOMAIN_NAME",
];

/// Value of the first line mentioning `name`, taken after its first `=`.
#[must_use]
pub fn extract(text: &str, name: &str) -> Option<String> {
    text.lines()
        .find(|line| line.contains(name))
        .and_then(|line| line.split('=').nth(1))
        .map(|value| value.trim_end().to_string())
}

/// True for an uncommented `KEY=value` line still using identity v2.
#[must_use]
pub fn needs_upgrade(line: &str) -> bool {
    if line.trim_start().starts_with('#') || line.matches('=').count() != 1 {
        return false;
    }
    let Some((key, value)) = line.split_once('=') else {
        return false;
    };
    (key == "OS_AUTH_URL" && value.contains("v2.0")) || key == "OS_TENANT_NAME"
}

/// Rewrites one line for identity v3, returning it unchanged when no
/// rewrite applies.
#[must_use]
pub fn upgrade_line(line: &str) -> Vec<String> {
    if !needs_upgrade(line) {
        return vec![line.to_string()];
    }
    info!("stackrc needs upgrade, because of line {line}");
    match line.split_once('=') {
        Some(("OS_AUTH_URL", value)) => {
            let mut lines = vec![format!("OS_AUTH_URL={}", value.replace("v2.0", ""))];
            lines.extend(V3_SETTINGS.iter().map(|setting| (*setting).to_string()));
            lines
        }
        _ => vec![line.replace("OS_TENANT_NAME", "OS_PROJECT_NAME")],
    }
}

/// Rewrites a whole document, keeping a trailing newline if present.
#[must_use]
pub fn upgrade_text(text: &str) -> String {
    let mut upgraded: Vec<String> = text.lines().flat_map(upgrade_line).collect();
    if text.ends_with('\n') {
        upgraded.push(String::new());
    }
    upgraded.join("\n")
}

/// Rewrites the credentials file in place for identity v3.
///
/// The new content is written next to the original and renamed over it,
/// keeping the original permissions.
///
/// # Errors
///
/// Returns an error if the file cannot be read or replaced.
pub fn upgrade_to_v3(path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)?;
    let permissions = std::fs::metadata(path)?.permissions();
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staging = path.with_file_name(format!(".{file_name}.{}", Uuid::new_v4()));

    let replaced = std::fs::write(&staging, upgrade_text(&text))
        .and_then(|()| std::fs::set_permissions(&staging, permissions))
        .and_then(|()| std::fs::rename(&staging, path));
    if replaced.is_err() && staging.exists() {
        let _ = std::fs::remove_file(&staging);
    }
    Ok(replaced?)
}

/// Copies the root credentials file into the user's home and hands it to
/// the user.
///
/// A missing root copy is expected on the first install.
///
/// # Errors
///
/// Returns an error if the ownership change fails.
pub async fn copy_stackrc(runner: &dyn CommandRunner, paths: &Paths, user: &str) -> Result<()> {
    let home = paths.home.display().to_string();
    match runner
        .run(
            &argv(&["sudo", "cp", ROOT_STACKRC, &home]),
            RunOptions::named("Copy stackrc"),
        )
        .await
    {
        Ok(_) => {}
        Err(UndercloudError::Command(CommandError::Failed { .. })) => {
            info!("{ROOT_STACKRC} not found, this is OK on initial deploy");
        }
        Err(e) => return Err(e),
    }

    let owner = format!("{user}:");
    let stackrc = paths.stackrc.display().to_string();
    runner
        .run(
            &argv(&["sudo", "chown", &owner, &stackrc]),
            RunOptions::named("Chown stackrc"),
        )
        .await?;
    Ok(())
}

/// Admin credentials from the credentials file, with the password looked
/// up in hiera.
///
/// # Errors
///
/// Returns an error if the file is unreadable, a value is missing, or the
/// hiera lookup fails.
pub async fn auth_credentials(runner: &dyn CommandRunner, paths: &Paths) -> Result<Credentials> {
    let text = std::fs::read_to_string(&paths.stackrc)?;
    let value = |name: &str| {
        extract(&text, name).ok_or_else(|| {
            UndercloudError::internal(format!("{name} not found in {}", paths.stackrc.display()))
        })
    };
    let username = value("OS_USERNAME")?;
    let project_name = value("OS_PROJECT_NAME")?;
    let auth_url = value("OS_AUTH_URL")?;

    let password = runner
        .run(&argv(&["sudo", "hiera", "admin_password"]), RunOptions::default())
        .await?
        .trim()
        .to_string();

    Ok(Credentials {
        auth_url,
        username,
        password,
        project_name,
    })
}

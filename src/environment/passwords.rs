//! Service secrets.
//!
//! Every secret is reused when already configured or persisted, otherwise
//! generated. The full set is written back to the passwords file so later
//! runs keep the same values.

use ini::Ini;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use super::Environment;
use crate::config::UndercloudConfig;
use crate::config::schema::{AUTH_OPTIONS, AUTH_SECTION};
use crate::error::{Result, UndercloudError};

const PASSWORD_LENGTH: usize = 40;

/// Heat requires its encryption key to be exactly this long.
const HEAT_KEY_LENGTH: usize = 32;

/// Generates a random hex token of at most `length` characters.
#[must_use]
pub fn generate_password(length: usize) -> String {
    let digest = Sha256::digest(Uuid::new_v4().to_string().as_bytes());
    let mut token = hex::encode(digest);
    token.truncate(length);
    token
}

/// Resolves every secret and exports it into `env`.
///
/// Returns the resolved values keyed by option name. Nothing is written to
/// disk; see [`write_password_file`].
///
/// # Errors
///
/// Returns an error if a value cannot be exported.
pub fn resolve_passwords(
    config: &UndercloudConfig,
    env: &mut Environment,
) -> Result<BTreeMap<&'static str, String>> {
    let mut resolved = BTreeMap::new();
    for spec in AUTH_OPTIONS {
        let value = match config.auth_value(spec.name) {
            Some(existing) => existing.to_string(),
            None => {
                let length = if spec.name == "undercloud_heat_encryption_key" {
                    HEAT_KEY_LENGTH
                } else {
                    PASSWORD_LENGTH
                };
                info!("Generated new password for {}", spec.name);
                generate_password(length)
            }
        };
        env.set(&spec.env_key(), value.clone())?;
        resolved.insert(spec.name, value);
    }
    Ok(resolved)
}

/// Persists the secrets exported in `env` with mode 0600.
///
/// The file is created owner-only, so the secrets are never readable by
/// others, even while it is being written.
///
/// # Errors
///
/// Returns an error if a secret is missing from `env` or the file cannot be
/// written.
pub fn write_password_file(path: &Path, env: &Environment) -> Result<()> {
    let mut ini = Ini::new();
    for spec in AUTH_OPTIONS {
        let key = spec.env_key();
        let value = env.get(&key).ok_or_else(|| {
            UndercloudError::internal(format!("{key} missing from the generated environment"))
        })?;
        ini.with_section(Some(AUTH_SECTION)).set(spec.name, value);
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // An existing file keeps its mode on open.
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    ini.write_to(&mut file)?;
    info!("Wrote passwords to {}", path.display());
    Ok(())
}

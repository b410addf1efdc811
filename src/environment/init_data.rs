//! Init data for the config-refresh run.
//!
//! The environment, plus a few values that only the host configuration
//! needs, is serialized to JSON and installed where the refresh agent
//! picks it up.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use super::Environment;
use crate::config::{Paths, UndercloudConfig};
use crate::error::{ConfigError, EnvironmentError, Result};
use crate::process::{CommandRunner, RunOptions, argv};

/// Directory the hieradata override is copied into.
pub const HIERADATA_DIR: &str = "/etc/puppet/hieradata";

/// Document consumed by the config-refresh run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitData {
    /// Every environment variable.
    #[serde(flatten)]
    pub environment: BTreeMap<String, String>,
    /// Hiera entry name of the override file, or empty.
    #[serde(rename = "HIERADATA_OVERRIDE")]
    pub hieradata_override: String,
    /// Nameservers as a JSON list.
    #[serde(rename = "UNDERCLOUD_NAMESERVERS")]
    pub nameservers: String,
    /// Network configuration document.
    pub net_config: String,
}

impl InitData {
    /// Serializes the document.
    ///
    /// # Errors
    ///
    /// Returns [`EnvironmentError::Serialization`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            EnvironmentError::Serialization {
                key: "init data".to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }
}

/// Assembles the init data, copying the hieradata override into place.
///
/// # Errors
///
/// Returns [`ConfigError::FileNotFound`] when an override file is missing,
/// or any copy failure.
pub async fn prepare_init_data(
    runner: &dyn CommandRunner,
    config: &UndercloudConfig,
    env: &Environment,
    paths: &Paths,
) -> Result<InitData> {
    let hieradata_override = match config.optional_string("hieradata_override") {
        Some(raw) => install_hieradata_override(runner, raw, &paths.home).await?,
        None => String::new(),
    };

    let net_config = match config.optional_string("net_config_override") {
        Some(path) => read_file(Path::new(path))?,
        None => {
            let template = paths.instack_share.join("templates").join("net-config.json.template");
            if template.is_file() {
                read_file(&template)?
            } else {
                String::new()
            }
        }
    };

    Ok(InitData {
        environment: env.as_map().clone(),
        hieradata_override,
        nameservers: serde_json::to_string(config.list("undercloud_nameservers")).map_err(|e| {
            EnvironmentError::Serialization {
                key: "UNDERCLOUD_NAMESERVERS".to_string(),
                message: e.to_string(),
            }
        })?,
        net_config,
    })
}

async fn install_hieradata_override(
    runner: &dyn CommandRunner,
    raw: &str,
    home: &Path,
) -> Result<String> {
    let raw_path = Path::new(raw);
    let file_name = raw_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let entry = raw_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let source = if raw_path.is_absolute() {
        raw_path.to_path_buf()
    } else {
        home.join(raw_path)
    };
    if !source.exists() {
        return Err(ConfigError::FileNotFound { path: source }.into());
    }

    let destination = Path::new(HIERADATA_DIR).join(&file_name);
    let source = source.display().to_string();
    let destination = destination.display().to_string();
    runner
        .run(&argv(&["sudo", "mkdir", "-p", HIERADATA_DIR]), RunOptions::default())
        .await?;
    runner
        .run(&argv(&["sudo", "cp", &source, &destination]), RunOptions::default())
        .await?;
    runner
        .run(&argv(&["sudo", "chmod", "0644", &destination]), RunOptions::default())
        .await?;
    info!("Installed hieradata override {destination}");
    Ok(entry)
}

fn read_file(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }
    Ok(std::fs::read_to_string(path)?)
}

/// Writes the document to a temporary file and moves it into place as
/// root with mode 0644.
///
/// # Errors
///
/// Returns an error if the file cannot be written or moved.
pub async fn write_init_data(
    runner: &dyn CommandRunner,
    data: &InitData,
    destination: &Path,
) -> Result<()> {
    let staging: PathBuf = std::env::temp_dir().join(format!("undercloud-init-data-{}.json", Uuid::new_v4()));
    std::fs::write(&staging, format!("{}\n", data.to_json()?))?;

    if let Some(parent) = destination.parent() {
        if !parent.exists() {
            let parent = parent.display().to_string();
            runner
                .run(&argv(&["sudo", "mkdir", "-p", &parent]), RunOptions::default())
                .await?;
        }
    }
    let staging = staging.display().to_string();
    let destination = destination.display().to_string();
    runner
        .run(&argv(&["sudo", "mv", &staging, &destination]), RunOptions::default())
        .await?;
    runner
        .run(&argv(&["sudo", "chmod", "0644", &destination]), RunOptions::default())
        .await?;
    Ok(())
}

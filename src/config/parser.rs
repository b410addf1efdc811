//! Configuration parser for `undercloud.conf` and the persisted secrets file.
//!
//! The secrets file is read first and `undercloud.conf` second, so values in
//! `undercloud.conf` win. Deprecated option names are still honoured.

use ini::{Ini, Properties};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::{AUTH_OPTIONS, AUTH_SECTION, DEFAULT_SUBNET, GLOBAL_OPTIONS, SUBNET_OPTIONS};
use super::types::{SubnetConfig, UndercloudConfig};
use crate::error::{ConfigError, Result};

/// Loader for the undercloud configuration.
#[derive(Debug, Clone)]
pub struct ConfigParser {
    conf_path: PathBuf,
    password_path: PathBuf,
}

impl ConfigParser {
    /// Creates a parser for the given configuration and secrets files.
    #[must_use]
    pub fn new(conf_path: impl Into<PathBuf>, password_path: impl Into<PathBuf>) -> Self {
        Self {
            conf_path: conf_path.into(),
            password_path: password_path.into(),
        }
    }

    /// Loads both files. Missing files fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a present file cannot be read or parsed.
    pub fn load(&self) -> Result<UndercloudConfig> {
        let passwords = read_optional(&self.password_path)?;
        let conf = read_optional(&self.conf_path)?;
        if conf.is_none() {
            warn!("{} does not exist. Using defaults.", self.conf_path.display());
        } else {
            info!("Loading configuration from: {}", self.conf_path.display());
        }
        Self::parse_str(
            conf.as_deref().unwrap_or_default(),
            passwords.as_deref(),
        )
    }

    /// Parses configuration text, optionally layered over secrets text.
    ///
    /// # Errors
    ///
    /// Returns an error if either document is not valid INI or a value does
    /// not fit its option type.
    pub fn parse_str(conf: &str, passwords: Option<&str>) -> Result<UndercloudConfig> {
        let conf_ini = parse_ini(conf, "undercloud.conf")?;
        let password_ini = passwords
            .map(|text| parse_ini(text, "undercloud-passwords.conf"))
            .transpose()?;

        let mut config = UndercloudConfig::default();
        let defaults = DefaultSection::new(&conf_ini);

        for spec in GLOBAL_OPTIONS {
            if let Some(raw) = defaults.lookup(spec.name, spec.deprecated_name) {
                config.set_option(spec.name, raw)?;
            }
        }

        if let Some(ini) = &password_ini {
            apply_auth(&mut config, ini);
        }
        apply_auth(&mut config, &conf_ini);

        let names: Vec<String> = config.list("subnets").to_vec();
        let subnets = names
            .iter()
            .map(|name| load_subnet(&conf_ini, &defaults, name))
            .collect();
        config.set_subnets(subnets);

        debug!(
            "Parsed configuration with {} subnet(s)",
            config.subnets().len()
        );
        Ok(config)
    }
}

/// Reads a file, returning `None` if it does not exist.
fn read_optional(path: &Path) -> Result<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    std::fs::read_to_string(path).map(Some).map_err(|e| {
        ConfigError::parse(
            format!("Failed to read file: {e}"),
            Some(path.display().to_string()),
        )
        .into()
    })
}

fn parse_ini(text: &str, source: &str) -> Result<Ini> {
    Ini::load_from_str(text).map_err(|e| {
        ConfigError::parse(format!("INI parse error: {e}"), Some(source.to_string())).into()
    })
}

/// The `[DEFAULT]` section, including keys placed before any header.
struct DefaultSection<'a> {
    named: Option<&'a Properties>,
    general: &'a Properties,
}

impl<'a> DefaultSection<'a> {
    fn new(ini: &'a Ini) -> Self {
        Self {
            named: ini.section(Some("DEFAULT")),
            general: ini.general_section(),
        }
    }

    fn get(&self, key: &str) -> Option<&'a str> {
        self.named
            .and_then(|section| section.get(key))
            .or_else(|| self.general.get(key))
    }

    fn lookup(&self, name: &str, deprecated: Option<&str>) -> Option<&'a str> {
        if let Some(value) = self.get(name) {
            return Some(value);
        }
        let alias = deprecated?;
        let value = self.get(alias)?;
        warn!("Option \"{alias}\" is deprecated. Use option \"{name}\" instead.");
        Some(value)
    }
}

fn apply_auth(config: &mut UndercloudConfig, ini: &Ini) {
    let Some(section) = ini.section(Some(AUTH_SECTION)) else {
        return;
    };
    for spec in AUTH_OPTIONS {
        if let Some(value) = section.get(spec.name) {
            config.set_auth(spec.name, value.trim());
        }
    }
}

fn load_subnet(ini: &Ini, defaults: &DefaultSection<'_>, name: &str) -> SubnetConfig {
    let mut subnet = if name == DEFAULT_SUBNET {
        SubnetConfig::with_defaults(name)
    } else {
        SubnetConfig::empty(name)
    };
    let section = ini.section(Some(name));

    for spec in SUBNET_OPTIONS {
        let own = section.and_then(|props| props.get(spec.name));
        let aliased = spec
            .deprecated_name
            .filter(|_| spec.deprecated_in_default)
            .and_then(|alias| {
                let value = defaults.get(alias)?;
                warn!(
                    "Option \"{alias}\" from group \"DEFAULT\" is deprecated. \
                     Use option \"{}\" from group \"{name}\".",
                    spec.name
                );
                Some(value)
            });
        if let Some(raw) = own.or(aliased) {
            subnet.set(spec.name, raw);
        }
    }
    subnet
}

//! Install environment.
//!
//! The environment handed to the provisioning tools is a flat string map
//! seeded from a base environment. Only allow-listed keys may be written;
//! reading and removing are unrestricted.

mod allowlist;
pub mod drivers;
pub mod endpoints;
mod generator;
mod init_data;
mod passwords;
pub mod subnets;

pub use allowlist::{DYNAMIC_KEYS, INSTACK_KEYS, is_permitted};
pub use generator::{GeneratorInputs, distribution_settings, generate, resolve_certificate_path};
pub use init_data::{HIERADATA_DIR, InitData, prepare_init_data, write_init_data};
pub use passwords::{generate_password, resolve_passwords, write_password_file};

use std::collections::BTreeMap;

use crate::error::EnvironmentError;

/// Allow-listed environment for the provisioning tools.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// An empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An environment seeded from arbitrary base variables.
    ///
    /// Base variables bypass the allow-list.
    pub fn from_base<K, V>(base: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: base
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    /// Sets an allow-listed key.
    ///
    /// # Errors
    ///
    /// Returns [`EnvironmentError::KeyNotPermitted`] for keys outside the
    /// allow-list.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<(), EnvironmentError> {
        if !is_permitted(key) {
            return Err(EnvironmentError::KeyNotPermitted {
                key: key.to_string(),
            });
        }
        self.vars.insert(key.to_string(), value.into());
        Ok(())
    }

    /// Value of a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Removes a key, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.vars.remove(key)
    }

    /// True when the key is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// The underlying map, for child process environments.
    #[must_use]
    pub const fn as_map(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    /// Iterates over all variables in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Number of variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// True when no variables are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_rejects_unknown_keys() {
        let mut env = Environment::new();
        env.set("LOCAL_IP", "192.168.24.1").unwrap();
        let err = env.set("NOT_A_KEY", "x").unwrap_err();
        assert_eq!(err.to_string(), "NOT_A_KEY is not a valid undercloud environment key");
        assert!(!env.contains_key("NOT_A_KEY"));
        assert_eq!(env.get("LOCAL_IP"), Some("192.168.24.1"));
    }

    #[test]
    fn test_base_keys_bypass_allowlist() {
        let mut env = Environment::from_base([("PATH", "/usr/bin"), ("DIB_YUM_REPO_CONF", "x")]);
        assert_eq!(env.get("PATH"), Some("/usr/bin"));
        assert_eq!(env.remove("DIB_YUM_REPO_CONF").as_deref(), Some("x"));
        assert_eq!(env.len(), 1);
        assert!(env.set("PATH", "/bin").is_err());
    }
}

//! Loaded configuration values.

use std::collections::BTreeMap;

use super::schema::{
    AUTH_OPTIONS, DEFAULT_SUBNET, GLOBAL_OPTIONS, OptionKind, OptionSpec, SUBNET_OPTIONS,
};
use crate::error::ConfigError;

static UNSET: OptionValue = OptionValue::Unset;

/// A typed option value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    /// No value and no default.
    Unset,
    /// String value.
    Str(String),
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// List value.
    List(Vec<String>),
}

impl OptionValue {
    /// Parses a raw INI value according to the option's kind.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when the value does not fit.
    pub fn parse(spec: &OptionSpec, raw: &str) -> Result<Self, ConfigError> {
        let invalid = |message: &str| ConfigError::InvalidValue {
            option: spec.name.to_string(),
            value: raw.to_string(),
            message: message.to_string(),
        };
        let trimmed = raw.trim();
        match spec.kind {
            OptionKind::Str => Ok(Self::Str(trimmed.to_string())),
            OptionKind::Bool => match trimmed.to_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(Self::Bool(true)),
                "false" | "no" | "off" | "0" => Ok(Self::Bool(false)),
                _ => Err(invalid("expected a boolean")),
            },
            OptionKind::Int => {
                let value: i64 = trimmed.parse().map_err(|_| invalid("expected an integer"))?;
                match spec.min {
                    Some(min) if value < min => {
                        Err(invalid(&format!("must be greater than or equal to {min}")))
                    }
                    _ => Ok(Self::Int(value)),
                }
            }
            OptionKind::List => Ok(Self::List(
                trimmed
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect(),
            )),
        }
    }

    /// The option's default value.
    #[must_use]
    pub fn default_for(spec: &OptionSpec) -> Self {
        spec.default
            .and_then(|raw| Self::parse(spec, raw).ok())
            .unwrap_or(Self::Unset)
    }

    /// Renders the value the way downstream templates expect it.
    ///
    /// Booleans are `True`/`False`, lists use bracketed quoted items and
    /// unset values are `None`.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Unset => "None".to_string(),
            Self::Str(value) => value.clone(),
            Self::Bool(true) => "True".to_string(),
            Self::Bool(false) => "False".to_string(),
            Self::Int(value) => value.to_string(),
            Self::List(items) => {
                let quoted: Vec<String> = items.iter().map(|item| format!("'{item}'")).collect();
                format!("[{}]", quoted.join(", "))
            }
        }
    }
}

/// Values of one subnet section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetConfig {
    /// Section name, also used as the segment's physical network.
    pub name: String,
    /// Network CIDR.
    pub cidr: Option<String>,
    /// First DHCP address.
    pub dhcp_start: Option<String>,
    /// Last DHCP address.
    pub dhcp_end: Option<String>,
    /// Inspection range as `start,end`.
    pub inspection_iprange: Option<String>,
    /// Gateway address.
    pub gateway: Option<String>,
    /// Masquerade this network for external access.
    pub masquerade: bool,
}

impl SubnetConfig {
    /// A subnet with no values set.
    #[must_use]
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cidr: None,
            dhcp_start: None,
            dhcp_end: None,
            inspection_iprange: None,
            gateway: None,
            masquerade: false,
        }
    }

    /// A subnet populated with the schema defaults.
    #[must_use]
    pub fn with_defaults(name: impl Into<String>) -> Self {
        let mut subnet = Self::empty(name);
        for spec in SUBNET_OPTIONS {
            if let Some(raw) = spec.default {
                subnet.set(spec.name, raw);
            }
        }
        subnet
    }

    /// Sets one option by name. Unknown names are ignored.
    pub fn set(&mut self, option: &str, raw: &str) {
        let value = Some(raw.trim().to_string());
        match option {
            "cidr" => self.cidr = value,
            "dhcp_start" => self.dhcp_start = value,
            "dhcp_end" => self.dhcp_end = value,
            "inspection_iprange" => self.inspection_iprange = value,
            "gateway" => self.gateway = value,
            "masquerade" => {
                self.masquerade = matches!(
                    raw.trim().to_lowercase().as_str(),
                    "true" | "yes" | "on" | "1"
                );
            }
            _ => {}
        }
    }

    /// Names of required options without a value, in schema order.
    #[must_use]
    pub fn missing_options(&self) -> Vec<&'static str> {
        [
            ("cidr", &self.cidr),
            ("dhcp_start", &self.dhcp_start),
            ("dhcp_end", &self.dhcp_end),
            ("inspection_iprange", &self.inspection_iprange),
            ("gateway", &self.gateway),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().is_none_or(str::is_empty))
        .map(|(name, _)| name)
        .collect()
    }

    /// Splits `inspection_iprange` into start and end.
    #[must_use]
    pub fn inspection_range(&self) -> Option<(&str, &str)> {
        let range = self.inspection_iprange.as_deref()?;
        let (start, end) = range.split_once(',')?;
        Some((start.trim(), end.trim()))
    }

    /// CIDR or the empty string.
    #[must_use]
    pub fn cidr_str(&self) -> &str {
        self.cidr.as_deref().unwrap_or_default()
    }

    /// Gateway or the empty string.
    #[must_use]
    pub fn gateway_str(&self) -> &str {
        self.gateway.as_deref().unwrap_or_default()
    }
}

/// The complete undercloud configuration.
///
/// Built once from the INI files and passed by reference through
/// validation, environment generation and post-install reconciliation.
#[derive(Debug, Clone)]
pub struct UndercloudConfig {
    values: BTreeMap<&'static str, OptionValue>,
    subnets: Vec<SubnetConfig>,
    auth: BTreeMap<&'static str, Option<String>>,
}

impl Default for UndercloudConfig {
    fn default() -> Self {
        let values = GLOBAL_OPTIONS
            .iter()
            .map(|spec| (spec.name, OptionValue::default_for(spec)))
            .collect();
        let auth = AUTH_OPTIONS
            .iter()
            .map(|spec| (spec.name, spec.default.map(str::to_string)))
            .collect();
        Self {
            values,
            subnets: vec![SubnetConfig::with_defaults(DEFAULT_SUBNET)],
            auth,
        }
    }
}

impl UndercloudConfig {
    /// Sets a global option from its raw INI form.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown options or values of the wrong type.
    pub fn set_option(&mut self, name: &str, raw: &str) -> Result<(), ConfigError> {
        let spec = GLOBAL_OPTIONS
            .iter()
            .find(|spec| spec.name == name)
            .ok_or_else(|| ConfigError::InvalidValue {
                option: name.to_string(),
                value: raw.to_string(),
                message: "unknown option".to_string(),
            })?;
        let value = OptionValue::parse(spec, raw)?;
        self.values.insert(spec.name, value);
        Ok(())
    }

    /// Sets a secret by option name. Unknown names are ignored.
    pub fn set_auth(&mut self, name: &str, value: impl Into<String>) {
        if let Some(spec) = AUTH_OPTIONS.iter().find(|spec| spec.name == name) {
            self.auth.insert(spec.name, Some(value.into()));
        }
    }

    /// Replaces the subnet groups.
    pub fn set_subnets(&mut self, subnets: Vec<SubnetConfig>) {
        self.subnets = subnets;
    }

    /// Value of a global option.
    #[must_use]
    pub fn value(&self, name: &str) -> &OptionValue {
        self.values.get(name).unwrap_or(&UNSET)
    }

    /// Iterates over global options in schema order.
    pub fn values(&self) -> impl Iterator<Item = (&'static OptionSpec, &OptionValue)> {
        GLOBAL_OPTIONS.iter().map(|spec| (spec, self.value(spec.name)))
    }

    /// String option, empty when unset.
    #[must_use]
    pub fn string(&self, name: &str) -> &str {
        match self.value(name) {
            OptionValue::Str(value) => value,
            _ => "",
        }
    }

    /// String option, `None` when unset or empty.
    #[must_use]
    pub fn optional_string(&self, name: &str) -> Option<&str> {
        Some(self.string(name)).filter(|value| !value.is_empty())
    }

    /// Boolean option.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.value(name), OptionValue::Bool(true))
    }

    /// Integer option.
    #[must_use]
    pub fn integer(&self, name: &str) -> i64 {
        match self.value(name) {
            OptionValue::Int(value) => *value,
            _ => 0,
        }
    }

    /// List option.
    #[must_use]
    pub fn list(&self, name: &str) -> &[String] {
        match self.value(name) {
            OptionValue::List(items) => items,
            _ => &[],
        }
    }

    /// Configured subnets, in `subnets` order.
    #[must_use]
    pub fn subnets(&self) -> &[SubnetConfig] {
        &self.subnets
    }

    /// Looks up a subnet by name.
    #[must_use]
    pub fn subnet(&self, name: &str) -> Option<&SubnetConfig> {
        self.subnets.iter().find(|subnet| subnet.name == name)
    }

    /// The subnet named by `local_subnet`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSubnetGroup`] when it is not configured.
    pub fn local_subnet(&self) -> Result<&SubnetConfig, ConfigError> {
        let name = self.string("local_subnet");
        self.subnet(name)
            .ok_or_else(|| ConfigError::MissingSubnetGroup {
                name: name.to_string(),
            })
    }

    /// A secret value, if configured or persisted.
    #[must_use]
    pub fn auth_value(&self, name: &str) -> Option<&str> {
        self.auth
            .get(name)
            .and_then(|value| value.as_deref())
            .filter(|value| !value.is_empty())
    }

    /// `local_ip` including its prefix.
    #[must_use]
    pub fn local_ip(&self) -> &str {
        self.string("local_ip")
    }

    /// True when the API endpoints are served over TLS.
    #[must_use]
    pub fn ssl_enabled(&self) -> bool {
        !self.string("undercloud_service_certificate").is_empty()
            || self.flag("generate_service_certificate")
    }

    /// Hostname to force on the host, if any.
    #[must_use]
    pub fn undercloud_hostname(&self) -> Option<&str> {
        self.optional_string("undercloud_hostname")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::global_option;

    #[test]
    fn test_defaults() {
        let config = UndercloudConfig::default();
        assert_eq!(config.local_ip(), "192.168.24.1/24");
        assert!(config.flag("enable_ui"));
        assert!(!config.flag("enable_routed_networks"));
        assert_eq!(config.integer("local_mtu"), 1500);
        assert_eq!(config.list("enabled_hardware_types"), ["ipmi", "redfish", "ilo", "idrac"]);
        assert_eq!(config.undercloud_hostname(), None);
        assert_eq!(config.auth_value("undercloud_ceilometer_snmpd_user"), Some("ro_snmp_user"));
        assert_eq!(config.auth_value("undercloud_db_password"), None);
        assert!(!config.ssl_enabled());
    }

    #[test]
    fn test_default_local_subnet() {
        let config = UndercloudConfig::default();
        let subnet = config.local_subnet().unwrap();
        assert_eq!(subnet.cidr.as_deref(), Some("192.168.24.0/24"));
        assert_eq!(subnet.inspection_range(), Some(("192.168.24.100", "192.168.24.120")));
        assert!(subnet.missing_options().is_empty());
    }

    #[test]
    fn test_missing_options_in_schema_order() {
        let mut subnet = SubnetConfig::empty("subnet1");
        subnet.set("dhcp_start", "10.0.0.5");
        assert_eq!(
            subnet.missing_options(),
            vec!["cidr", "dhcp_end", "inspection_iprange", "gateway"]
        );
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        let mtu = global_option("scheduler_max_attempts").unwrap();
        assert!(OptionValue::parse(mtu, "0").is_err());
        assert!(OptionValue::parse(mtu, "abc").is_err());
        assert_eq!(OptionValue::parse(mtu, "5").unwrap(), OptionValue::Int(5));

        let flag = global_option("enable_ui").unwrap();
        assert!(OptionValue::parse(flag, "maybe").is_err());
        assert_eq!(OptionValue::parse(flag, "False").unwrap(), OptionValue::Bool(false));
    }

    #[test]
    fn test_render() {
        assert_eq!(OptionValue::Bool(true).render(), "True");
        assert_eq!(OptionValue::Unset.render(), "None");
        assert_eq!(
            OptionValue::List(vec!["a".to_string(), "b".to_string()]).render(),
            "['a', 'b']"
        );
        assert_eq!(OptionValue::List(Vec::new()).render(), "[]");
    }

    #[test]
    fn test_set_option() {
        let mut config = UndercloudConfig::default();
        config.set_option("enable_ui", "false").unwrap();
        config.set_option("undercloud_nameservers", "8.8.8.8, 8.8.4.4").unwrap();
        assert!(!config.flag("enable_ui"));
        assert_eq!(config.list("undercloud_nameservers"), ["8.8.8.8", "8.8.4.4"]);
        assert!(config.set_option("bogus", "1").is_err());
    }
}

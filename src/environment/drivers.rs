//! Bare-metal driver and interface lists.

use std::collections::BTreeSet;

/// Renders items as `["a", "b"]` for the configuration templates.
#[must_use]
pub fn make_list<'a>(items: impl IntoIterator<Item = &'a str>) -> String {
    let quoted: Vec<String> = items.into_iter().map(|item| format!("\"{item}\"")).collect();
    format!("[{}]", quoted.join(", "))
}

/// True for classic driver names as opposed to hardware types.
#[must_use]
pub fn is_classic_driver(name: &str) -> bool {
    name == "fake"
        || ["fake_", "pxe_", "agent_", "iscsi_"]
            .iter()
            .any(|prefix| name.starts_with(prefix))
}

/// Derived driver, hardware type and interface sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverSettings {
    /// Classic drivers.
    pub drivers: BTreeSet<String>,
    /// Hardware types.
    pub hardware_types: BTreeSet<String>,
    /// Value for `INSPECTION_NODE_NOT_FOUND_HOOK`.
    pub node_not_found_hook: &'static str,
    /// Boot interfaces.
    pub boot: BTreeSet<&'static str>,
    /// Management interfaces.
    pub management: BTreeSet<&'static str>,
    /// Power interfaces.
    pub power: BTreeSet<&'static str>,
    /// RAID interfaces.
    pub raid: BTreeSet<&'static str>,
    /// Vendor interfaces.
    pub vendor: BTreeSet<&'static str>,
}

impl DriverSettings {
    /// Derives interface sets from the enabled drivers and hardware types.
    ///
    /// With node discovery on, the default discovery driver is added to
    /// whichever set it belongs to and unknown nodes are enrolled.
    #[must_use]
    pub fn derive(
        enabled_drivers: &[String],
        enabled_hardware_types: &[String],
        discovery_default_driver: Option<&str>,
    ) -> Self {
        let mut drivers: BTreeSet<String> = enabled_drivers.iter().cloned().collect();
        let mut hardware_types: BTreeSet<String> = enabled_hardware_types.iter().cloned().collect();

        let node_not_found_hook = match discovery_default_driver {
            Some(driver) => {
                if is_classic_driver(driver) {
                    drivers.insert(driver.to_string());
                } else {
                    hardware_types.insert(driver.to_string());
                }
                "enroll"
            }
            None => "",
        };
        let enabled = |hw_type: &str| hardware_types.contains(hw_type);

        let mut management: BTreeSet<&'static str> = ["fake", "ipmitool"].into();
        for hw_type in ["redfish", "idrac", "ilo", "irmc", "staging-ovirt"] {
            if enabled(hw_type) {
                management.insert(hw_type);
            }
        }
        for (hw_type, iface) in [("cisco-ucs-managed", "ucsm"), ("cisco-ucs-standalone", "cimc")] {
            if enabled(hw_type) {
                management.insert(iface);
            }
        }

        let mut boot: BTreeSet<&'static str> = ["pxe"].into();
        for (hw_type, iface) in [("ilo", "ilo-pxe"), ("irmc", "irmc-pxe")] {
            if enabled(hw_type) {
                boot.insert(iface);
            }
        }

        let mut raid: BTreeSet<&'static str> = ["no-raid"].into();
        if enabled("idrac") {
            raid.insert("idrac");
        }

        let mut vendor: BTreeSet<&'static str> = ["no-vendor"].into();
        for (hw_type, iface) in [("ipmi", "ipmitool"), ("idrac", "idrac")] {
            if enabled(hw_type) {
                vendor.insert(iface);
            }
        }

        // snmp uses fake management with snmp power.
        let mut power = management.clone();
        if enabled("snmp") {
            power.insert("snmp");
        }

        Self {
            drivers,
            hardware_types,
            node_not_found_hook,
            boot,
            management,
            power,
            raid,
            vendor,
        }
    }

    /// Environment entries for the derived sets.
    #[must_use]
    pub fn env_entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("ENABLED_DRIVERS", make_list(self.drivers.iter().map(String::as_str))),
            (
                "ENABLED_HARDWARE_TYPES",
                make_list(self.hardware_types.iter().map(String::as_str)),
            ),
            ("ENABLED_BOOT_INTERFACES", make_list(self.boot.iter().copied())),
            ("ENABLED_MANAGEMENT_INTERFACES", make_list(self.management.iter().copied())),
            ("ENABLED_RAID_INTERFACES", make_list(self.raid.iter().copied())),
            ("ENABLED_VENDOR_INTERFACES", make_list(self.vendor.iter().copied())),
            ("ENABLED_POWER_INTERFACES", make_list(self.power.iter().copied())),
            ("INSPECTION_NODE_NOT_FOUND_HOOK", self.node_not_found_hook.to_string()),
        ]
    }
}

// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![forbid(unsafe_code)]               // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Undercloud Installer
//!
//! Installs, upgrades and reconciles the single-host control plane (the
//! "undercloud") that deploys and manages an `OpenStack` overcloud.
//!
//! ## Overview
//!
//! An install turns `undercloud.conf` into a running control plane:
//!
//! - Validate the host and the configuration before touching anything
//! - Generate the environment and init data for the provisioning tools
//! - Run the provisioning tool and the config-refresh run
//! - Reconcile the cloud: networks, flavors, keys, workflows and roles
//!
//! ## Architecture
//!
//! Every step runs to completion before the next one starts. External
//! programs run through [`process::CommandRunner`]; cloud services are
//! reached through the traits in [`openstack::api`], so both can be
//! replaced in tests.
//!
//! ## Modules
//!
//! - [`config`]: Option schema, `undercloud.conf` parsing and validation
//! - [`host`]: Host facts and precondition checks
//! - [`environment`]: Install environment, secrets and init data
//! - [`process`]: External command execution
//! - [`openstack`]: `OpenStack` API client
//! - [`reconciler`]: Post-install cloud reconciliation
//! - [`stackrc`]: Client credentials file handling
//! - [`installer`]: Install, upgrade and pre-upgrade flows
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```ini
//! [DEFAULT]
//! local_ip = 192.168.24.1/24
//! local_interface = eth1
//! enable_routed_networks = false
//!
//! [ctlplane-subnet]
//! cidr = 192.168.24.0/24
//! gateway = 192.168.24.1
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod environment;
pub mod error;
pub mod host;
pub mod installer;
pub mod openstack;
pub mod process;
pub mod reconciler;
pub mod stackrc;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, Paths, UndercloudConfig};
pub use environment::Environment;
pub use error::{Result, UndercloudError};
pub use host::HostFacts;
pub use installer::{InstallReport, InstallRequest, Installer};
pub use openstack::{CloudApi, CloudConnector, OpenStackClient, OpenStackConnector};
pub use process::{CommandRunner, ProcessRunner};
pub use reconciler::{ReconciliationReport, Reconciler};

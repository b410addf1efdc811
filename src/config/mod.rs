//! Configuration module for the undercloud installer.
//!
//! This module handles all configuration-related functionality:
//! - The declarative option schema
//! - Loading `undercloud.conf` and the persisted secrets file
//! - Validation of network and architecture settings

pub mod addr;
mod parser;
mod paths;
pub mod schema;
mod types;
mod validator;

pub use parser::ConfigParser;
pub use paths::{CFN_INIT_DATA, Paths, WORKBOOK_DIR};
pub use types::{OptionValue, SubnetConfig, UndercloudConfig};
pub use validator::{
    ConfigParameters, ConfigValidator, ValidationReport, validate_architectures, validate_config,
    validate_routed_networks, validate_subnet, validate_subnet_overlaps,
};

//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Undercloud - installs and upgrades an `OpenStack` undercloud.
#[derive(Parser, Debug)]
#[command(name = "undercloud")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to `undercloud.conf` (defaults to `~/undercloud.conf`).
    #[arg(short, long, global = true, env = "UNDERCLOUD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install the undercloud, or upgrade an existing one.
    Install {
        /// Upgrade an existing undercloud.
        #[arg(long)]
        upgrade: bool,

        /// Source checkout holding the elements and package lists.
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },

    /// Prepare an existing undercloud for an upgrade.
    PreUpgrade,

    /// Check the host and the configuration without changing anything.
    Validate,

    /// Print the environment an install would pass to the provisioning tools.
    GenerateEnv {
        /// Source checkout holding the elements and package lists.
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },

    /// Print every configuration option with its default.
    ListOpts,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Default log level: `debug` for runs that change the host or when
    /// verbose, `info` otherwise.
    #[must_use]
    pub const fn log_level(&self) -> &'static str {
        if self.verbose || self.command.changes_host() {
            "debug"
        } else {
            "info"
        }
    }
}

impl Commands {
    /// True for commands that modify the host and write the install log.
    #[must_use]
    pub const fn changes_host(&self) -> bool {
        matches!(self, Self::Install { .. } | Self::PreUpgrade)
    }
}

//! CLI module for the undercloud installer.
//!
//! This module provides the command-line interface and the logging setup
//! shared by every command.

mod commands;
mod output;

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::Result;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;

/// Set to `1` when a caller captures the log itself.
const LOG_CAPTURE_VAR: &str = "OS_LOG_CAPTURE";

/// Initializes the logging system.
///
/// Logs go to stderr unless [`LOG_CAPTURE_VAR`] is `1`, and to `log_file`
/// when one is given. `RUST_LOG` overrides `level`.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened.
pub fn init_logging(level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let captured = std::env::var(LOG_CAPTURE_VAR).is_ok_and(|value| value == "1");
    let stderr = (!captured).then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    let file = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file)
        .init();
    Ok(())
}

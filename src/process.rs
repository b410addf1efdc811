//! External command execution.
//!
//! Two modes: [`CommandRunner::run`] captures combined output and returns
//! it, [`CommandRunner::run_live`] streams each line into the log while the
//! command runs. Both force `PYTHONIOENCODING=utf8` so localized output
//! survives the pipe.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::error::{CommandError, Result};

/// Encoding variable forced on every child process.
const ENCODING_VAR: (&str, &str) = ("PYTHONIOENCODING", "utf8");

/// Options for one command invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions<'a> {
    /// Complete child environment. `None` inherits the current one.
    pub env: Option<&'a BTreeMap<String, String>>,
    /// Display name for logs and errors. Defaults to the first argument.
    pub name: Option<&'a str>,
}

impl<'a> RunOptions<'a> {
    /// Options with a display name.
    #[must_use]
    pub const fn named(name: &'a str) -> Self {
        Self {
            env: None,
            name: Some(name),
        }
    }

    /// Options with an explicit child environment.
    #[must_use]
    pub const fn with_env(env: &'a BTreeMap<String, String>) -> Self {
        Self {
            env: Some(env),
            name: None,
        }
    }
}

/// Builds an argument vector from string slices.
#[must_use]
pub fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| (*part).to_string()).collect()
}

/// Runs external commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs to completion and returns combined stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Failed`] on a non-zero exit after logging the
    /// captured output.
    async fn run(&self, args: &[String], options: RunOptions<'_>) -> Result<String>;

    /// Runs to completion, logging each output line as it arrives.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::LiveFailed`] on a non-zero exit.
    async fn run_live(&self, args: &[String], options: RunOptions<'_>) -> Result<()>;
}

/// [`CommandRunner`] backed by real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Creates a runner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn command(args: &[String], options: RunOptions<'_>) -> Result<(Command, String)> {
        let (program, rest) = args.split_first().ok_or(CommandError::Empty)?;
        let name = options.name.unwrap_or(program).to_string();

        let mut command = Command::new(program);
        command.args(rest).stdin(Stdio::null());
        if let Some(env) = options.env {
            command.env_clear().envs(env);
        }
        command.env(ENCODING_VAR.0, ENCODING_VAR.1);
        Ok((command, name))
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, args: &[String], options: RunOptions<'_>) -> Result<String> {
        let (mut command, name) = Self::command(args, options)?;
        let output = command
            .output()
            .await
            .map_err(|source| CommandError::Spawn {
                name: name.clone(),
                source,
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            Ok(combined)
        } else {
            error!("{name} failed: {combined}");
            Err(CommandError::Failed {
                name,
                status: output.status.code(),
                output: combined,
            }
            .into())
        }
    }

    async fn run_live(&self, args: &[String], options: RunOptions<'_>) -> Result<()> {
        let (mut command, name) = Self::command(args, options)?;
        let mut child = command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CommandError::Spawn {
                name: name.clone(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        tokio::join!(log_lines(stdout), log_lines(stderr));

        let status = child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(CommandError::LiveFailed { name }.into())
        }
    }
}

/// Logs each output line, decoding invalid UTF-8 lossily. The stream is
/// always read to its end so the child never writes into a closed pipe.
async fn log_lines<R: AsyncRead + Unpin>(stream: Option<R>) {
    let Some(stream) = stream else {
        return;
    };
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => return,
            Ok(_) => info!("{}", String::from_utf8_lossy(&line).trim_end()),
            Err(e) => {
                warn!("Failed to read command output: {e}");
                let _ = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await;
                return;
            }
        }
    }
}

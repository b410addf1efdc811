//! Undercloud CLI entrypoint.
//!
//! This is the main entrypoint for the undercloud command-line tool.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use undercloud_installer::cli::{Cli, Commands, OutputFormatter, init_logging};
use undercloud_installer::config::{ConfigParser, ConfigValidator, Paths, UndercloudConfig};
use undercloud_installer::error::Result;
use undercloud_installer::host::HostFacts;
use undercloud_installer::installer::{
    InstallRequest, Installer, completion_message, failure_message, operation_name,
};
use undercloud_installer::openstack::OpenStackConnector;
use undercloud_installer::process::ProcessRunner;
use undercloud_installer::reconciler::TokioClock;

use tracing::{debug, error, info};

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    let paths = match &cli.config {
        Some(path) => Paths::detect().with_conf_path(path),
        None => Paths::detect(),
    };

    let log_file = cli.command.changes_host().then_some(paths.log_file.as_path());
    if let Err(e) = init_logging(cli.log_level(), log_file) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli, paths)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Main async entry point.
async fn run(cli: Cli, paths: Paths) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Install { upgrade, root } => cmd_install(&paths, upgrade, &root, &formatter).await,
        Commands::PreUpgrade => cmd_pre_upgrade(&paths).await,
        Commands::Validate => cmd_validate(&paths, &formatter).await,
        Commands::GenerateEnv { root } => cmd_generate_env(&paths, &root, &formatter),
        Commands::ListOpts => {
            println!("{}", formatter.format_options());
            Ok(())
        }
    }
}

/// Everything a command needs from the host.
struct Host {
    config: UndercloudConfig,
    facts: HostFacts,
    runner: ProcessRunner,
    connector: OpenStackConnector,
    clock: TokioClock,
}

impl Host {
    fn load(paths: &Paths) -> Result<Self> {
        debug!("Loading configuration from: {}", paths.conf_path.display());
        let config = ConfigParser::new(&paths.conf_path, &paths.password_path).load()?;
        Ok(Self {
            config,
            facts: HostFacts::detect(paths)?,
            runner: ProcessRunner::new(),
            connector: OpenStackConnector,
            clock: TokioClock::new(),
        })
    }

    fn installer<'a>(&'a self, paths: &'a Paths) -> Installer<'a> {
        Installer::new(
            &self.config,
            paths,
            &self.facts,
            &self.runner,
            &self.connector,
            &self.clock,
        )
    }
}

/// Process environment and working directory the generated environment
/// starts from.
fn invocation() -> Result<(BTreeMap<String, String>, PathBuf)> {
    Ok((std::env::vars().collect(), std::env::current_dir()?))
}

/// Install or upgrade the undercloud.
async fn cmd_install(
    paths: &Paths,
    upgrade: bool,
    root: &Path,
    formatter: &OutputFormatter,
) -> Result<()> {
    let operation = operation_name(upgrade);
    info!("Logging to {}", paths.log_file.display());

    let mut debug_errors = true;
    let result = async {
        let host = Host::load(paths)?;
        debug_errors = host.config.flag("undercloud_debug");
        let (base, cwd) = invocation()?;
        let request = InstallRequest {
            root,
            cwd: &cwd,
            base: &base,
            upgrade,
        };
        host.installer(paths).install(&request).await
    }
    .await;

    match result {
        Ok(report) => {
            info!("{}", completion_message(operation, paths));
            println!("{}", formatter.format_install(&report));
            Ok(())
        }
        Err(e) => {
            error!("{}", failure_message(operation, &e, &paths.log_file));
            if debug_errors {
                error!("{e:?}");
            }
            Err(e)
        }
    }
}

/// Prepare an existing undercloud for an upgrade.
async fn cmd_pre_upgrade(paths: &Paths) -> Result<()> {
    let host = Host::load(paths)?;
    host.installer(paths).pre_upgrade().await?;
    info!("Undercloud pre-upgrade finished");
    Ok(())
}

/// Check the configuration, then the host, without changing either.
async fn cmd_validate(paths: &Paths, formatter: &OutputFormatter) -> Result<()> {
    let host = Host::load(paths)?;
    let report = ConfigValidator::new(&host.facts.interfaces).validate(&host.config);
    println!("{}", formatter.format_validation(&report));
    report.into_result()?;
    host.installer(paths).check().await?;
    formatter.success("Host checks passed");
    Ok(())
}

/// Print the environment an install would use.
fn cmd_generate_env(paths: &Paths, root: &Path, formatter: &OutputFormatter) -> Result<()> {
    let host = Host::load(paths)?;
    let (base, cwd) = invocation()?;
    let request = InstallRequest {
        root,
        cwd: &cwd,
        base: &base,
        upgrade: false,
    };
    let env = host.installer(paths).generate_environment(&request)?;
    print!("{}", formatter.format_environment(&env));
    Ok(())
}

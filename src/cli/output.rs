//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::ValidationReport;
use crate::config::schema::{OptionGroup, OptionSpec, all_options};
use crate::environment::Environment;
use crate::installer::InstallReport;
use crate::reconciler::FlavorOutcome;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Flavor row for table display.
#[derive(Tabled)]
struct FlavorRow {
    #[tabled(rename = "Flavor")]
    name: String,
    #[tabled(rename = "Result")]
    outcome: String,
}

/// Subnet row for table display.
#[derive(Tabled)]
struct SubnetRow {
    #[tabled(rename = "Subnet")]
    name: String,
    #[tabled(rename = "Change")]
    change: String,
}

/// Option row for JSON output.
#[derive(Serialize)]
struct OptionJson {
    name: &'static str,
    group: &'static str,
    default: Option<&'static str>,
    deprecated_name: Option<&'static str>,
    help: &'static str,
}

impl From<&OptionSpec> for OptionJson {
    fn from(spec: &OptionSpec) -> Self {
        Self {
            name: spec.name,
            group: group_name(spec.group),
            default: spec.default,
            deprecated_name: spec.deprecated_name,
            help: spec.help,
        }
    }
}

const fn group_name(group: OptionGroup) -> &'static str {
    match group {
        OptionGroup::Global => "DEFAULT",
        OptionGroup::Subnet => "ctlplane-subnet",
        OptionGroup::Auth => "auth",
    }
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the outcome of an install or upgrade.
    #[must_use]
    pub fn format_install(&self, report: &InstallReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => Self::format_install_text(report),
        }
    }

    fn format_install_text(report: &InstallReport) -> String {
        let reconciliation = &report.reconciliation;
        let mut output = String::new();
        let _ = writeln!(
            output,
            "\n{} Undercloud {} finished",
            "✓".green(),
            report.operation
        );

        let subnets = &reconciliation.subnets;
        let rows: Vec<SubnetRow> = subnets
            .created
            .iter()
            .map(|name| SubnetRow {
                name: name.clone(),
                change: "created".green().to_string(),
            })
            .chain(subnets.updated.iter().map(|name| SubnetRow {
                name: name.clone(),
                change: "updated".yellow().to_string(),
            }))
            .collect();
        if !rows.is_empty() {
            output.push('\n');
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        let rows: Vec<FlavorRow> = reconciliation
            .flavors
            .iter()
            .map(|(name, outcome)| FlavorRow {
                name: name.clone(),
                outcome: Self::format_flavor_outcome(*outcome),
            })
            .collect();
        if !rows.is_empty() {
            output.push('\n');
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        let workflows = &reconciliation.workflows;
        let _ = write!(
            output,
            "\nWorkbooks: {} created, {} deleted\n",
            workflows.workbooks_created.len().to_string().green(),
            workflows.workbooks_deleted.len().to_string().red()
        );
        if workflows.plan_created {
            let _ = writeln!(output, "Default plan created");
        }
        if reconciliation.keypair_created {
            let _ = writeln!(output, "Keypair \"default\" uploaded");
        }
        if !reconciliation.stacks_migrated.is_empty() {
            let _ = writeln!(
                output,
                "Stacks migrated to convergence: {}",
                reconciliation.stacks_migrated.join(", ")
            );
        }
        output
    }

    fn format_flavor_outcome(outcome: FlavorOutcome) -> String {
        match outcome {
            FlavorOutcome::Created => "created".green().to_string(),
            FlavorOutcome::Updated => "updated".yellow().to_string(),
            FlavorOutcome::Skipped => "skipped".red().to_string(),
        }
    }

    /// Formats a validation report.
    #[must_use]
    pub fn format_validation(&self, report: &ValidationReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::json!({
                "valid": report.is_valid(),
                "errors": report.errors,
            })
            .to_string(),
            OutputFormat::Text => {
                if report.is_valid() {
                    return format!("{} Configuration is valid\n", "✓".green());
                }
                let mut output = format!("{} Configuration is invalid:\n", "✗".red());
                for message in &report.errors {
                    let _ = writeln!(output, "   - {message}");
                }
                output
            }
        }
    }

    /// Formats the generated environment.
    #[must_use]
    pub fn format_environment(&self, env: &Environment) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(env.as_map()).unwrap_or_default(),
            OutputFormat::Text => env.iter().fold(String::new(), |mut output, (key, value)| {
                let _ = writeln!(output, "{key}={value}");
                output
            }),
        }
    }

    /// Formats every option as a sample configuration file.
    #[must_use]
    pub fn format_options(&self) -> String {
        match self.format {
            OutputFormat::Json => {
                let options: Vec<OptionJson> = all_options().map(OptionJson::from).collect();
                serde_json::to_string_pretty(&options).unwrap_or_default()
            }
            OutputFormat::Text => Self::sample_config(),
        }
    }

    fn sample_config() -> String {
        let mut output = String::new();
        let mut group = None;
        for spec in all_options() {
            if group != Some(spec.group) {
                if group.is_some() {
                    output.push('\n');
                }
                let _ = writeln!(output, "[{}]\n", group_name(spec.group));
                group = Some(spec.group);
            }
            let _ = writeln!(output, "# {}", spec.help);
            if let Some(deprecated) = spec.deprecated_name {
                let _ = writeln!(output, "# Deprecated name: {deprecated}");
            }
            let _ = writeln!(output, "#{} = {}\n", spec.name, spec.default.unwrap_or("<None>"));
        }
        output
    }

    /// Prints a success message.
    pub fn success(&self, message: &str) {
        if matches!(self.format, OutputFormat::Text) {
            eprintln!("{} {message}", "✓".green());
        }
    }

    /// Prints an error message.
    pub fn error(&self, message: &str) {
        if matches!(self.format, OutputFormat::Text) {
            eprintln!("{} {message}", "✗".red());
        }
    }
}

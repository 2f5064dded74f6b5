//! Config command - view and check the configuration
//!
//! Provides the `ifcbdb config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Prints where the configuration file is read from
//! 3. Validates the configuration file and reports errors

use anyhow::{Context, Result};
use clap::Subcommand;
use ifcbdb_core::config::Config;
use tracing::info;

use crate::context::CliContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Validate the configuration file
    Validate,
}

impl ConfigCommand {
    pub async fn execute(&self, ctx: &CliContext, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(ctx, format),
            ConfigCommand::Path => execute_path(ctx, format),
            ConfigCommand::Validate => execute_validate(ctx, format),
        }
    }
}

fn execute_show(ctx: &CliContext, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    info!(config_path = %ctx.config_path().display(), "Showing configuration");

    if format.is_json() {
        let json = serde_json::to_value(ctx.config())
            .context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Configuration ({})", ctx.config_path().display()));
        formatter.info("");
        let yaml = ctx
            .config()
            .to_yaml()
            .context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }
    Ok(())
}

fn execute_path(ctx: &CliContext, format: OutputFormat) -> Result<()> {
    let path = ctx.config_path();
    if format.is_json() {
        get_formatter(format).print_json(&serde_json::json!({
            "config_path": path,
            "exists": path.exists(),
        }));
    } else {
        println!("{}", path.display());
    }
    Ok(())
}

fn execute_validate(ctx: &CliContext, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let config_path = ctx.config_path();

    // Reload from disk: the context silently falls back to defaults
    let config = if config_path.exists() {
        match Config::load(config_path) {
            Ok(config) => config,
            Err(e) => {
                let message = format!("Failed to parse configuration: {e:#}");
                if format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "valid": false,
                        "config_path": config_path,
                        "errors": [message],
                    }));
                } else {
                    formatter.error(&message);
                    formatter.info(&format!("File: {}", config_path.display()));
                }
                anyhow::bail!("Configuration is invalid");
            }
        }
    } else {
        formatter.info(&format!(
            "Configuration file not found at {}; validating defaults",
            config_path.display()
        ));
        Config::default()
    };

    let errors = config.validate();
    if format.is_json() {
        let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": config_path,
            "errors": error_strings,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.info(&format!("File: {}", config_path.display()));
    } else {
        formatter.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
        formatter.info(&format!("File: {}", config_path.display()));
        formatter.info("");
        for error in &errors {
            formatter.info(&format!("  {} - {}", error.field, error.message));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("Configuration is invalid")
    }
}

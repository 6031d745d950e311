// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Transit CLI
//!
//! The `transit` binary inspects node configuration and runs relocation
//! scenarios against an in-process cluster.
//!
//! ## Commands
//!
//! - `transit config show|validate|generate` - Configuration management
//! - `transit simulate` - Move a counter unit around an in-process cluster

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;

use transit_cli::commands::{self, ConfigCommand, SimulateCommand};
use transit_core::domain::node_config::{LoggingConfig, NodeConfigManifest};

const DEFAULT_LOG_LEVEL: &str = "warn";

/// Transit - live unit relocation between nodes
#[derive(Parser)]
#[command(name = "transit")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "TRANSIT_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to the
    /// configured level, else warn
    #[arg(long, global = true, env = "TRANSIT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log output format; defaults to the configured format, else text
    #[arg(long, global = true, env = "TRANSIT_LOG_FORMAT", value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Relocate a counter unit around an in-process cluster
    #[command(name = "simulate")]
    Simulate {
        #[command(flatten)]
        command: SimulateCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging is not up yet, so a broken config only surfaces in the command itself.
    let configured = NodeConfigManifest::load_or_default(cli.config.clone())
        .ok()
        .and_then(|m| m.spec.observability)
        .and_then(|o| o.logging);
    let (level, format) = resolve_logging(cli.log_level.as_deref(), cli.log_format, configured.as_ref());
    init_logging(&level, format)?;

    match cli.command {
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        Some(Commands::Simulate { command }) => {
            commands::simulate::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Command-line flags win over the configuration file's
/// `spec.observability.logging`, which wins over the defaults.
fn resolve_logging(
    level: Option<&str>,
    format: Option<LogFormat>,
    configured: Option<&LoggingConfig>,
) -> (String, LogFormat) {
    let level = level
        .map(str::to_string)
        .or_else(|| configured.map(|c| c.level.clone()))
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
    let format = format
        .or_else(|| configured.and_then(|c| LogFormat::from_str(&c.format, true).ok()))
        .unwrap_or(LogFormat::Text);
    (level, format)
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }

    Ok(())
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use transit_core::domain::node_config::NodeConfigManifest;

const MINIMAL_TEMPLATE: &str = include_str!("../../templates/config-minimal.yaml");
const EXAMPLES_TEMPLATE: &str = include_str!("../../templates/config-with-examples.yaml");

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./transit-config.yaml)
        #[arg(short, long, default_value = "./transit-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(&output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = NodeConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. TRANSIT_CONFIG_PATH: {}",
            std::env::var("TRANSIT_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./transit-config.yaml");
        println!("  4. ~/.transit/config.yaml");
        println!("  5. /etc/transit/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Node Identity:".bold());
    println!("  Name: {}", config.metadata.name);
    println!("  ID: {}", config.spec.node.id);
    if let Some(region) = &config.spec.node.region {
        println!("  Region: {}", region);
    }
    if !config.spec.node.tags.is_empty() {
        println!("  Tags: {}", config.spec.node.tags.join(", "));
    }
    println!();

    println!("{}", "Mobility:".bold());
    println!("  Max state bytes: {}", config.spec.mobility.max_state_bytes);
    println!("  Verify round trip: {}", config.spec.mobility.verify_round_trip);
    println!();

    println!("{}", "Cluster:".bold());
    if config.spec.cluster.peers.is_empty() {
        println!("  Peers: {}", "(none)".dimmed());
    } else {
        for peer in &config.spec.cluster.peers {
            println!("  - {}", peer);
        }
    }
    match config.spec.cluster.channel_capacity {
        Some(capacity) => println!("  Channel capacity: {}", capacity),
        None => println!("  Channel capacity: {}", "(default)".dimmed()),
    }
    println!();

    if let Some(logging) = config
        .spec
        .observability
        .as_ref()
        .and_then(|o| o.logging.as_ref())
    {
        println!("{}", "Logging:".bold());
        println!("  Level: {}", logging.level);
        println!("  Format: {}", logging.format);
        println!();
    }

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = NodeConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: &Path, with_examples: bool) -> Result<()> {
    write_sample(output, with_examples)?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

fn write_sample(output: &Path, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        EXAMPLES_TEMPLATE
    } else {
        MINIMAL_TEMPLATE
    };

    std::fs::write(output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))
}

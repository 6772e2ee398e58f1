//! custodyctl - operator tooling for shared-custody allowance funds
//!
//! - Resolve and print the fund configuration
//! - Replay a JSON script of deposits, creations, approvals and withdrawals
//!   against a fresh fund and report outcomes, notifications and payouts

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use custody_core::AllowanceFund;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod script;

use crate::config::CliConfig;
use crate::error::CliError;

/// Shared-custody allowance fund CLI
#[derive(Parser)]
#[command(name = "custodyctl")]
#[command(about = "Shared-custody allowance fund tooling", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path (TOML, JSON or YAML)
    #[arg(short, long, env = "CUSTODY_CONFIG")]
    config: Option<PathBuf>,

    /// Log level, overrides the configured one
    #[arg(long, env = "CUSTODY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "CUSTODY_LOG_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the resolved configuration
    ShowConfig,

    /// Replay an operation script against a fresh fund
    Replay {
        /// JSON file holding a list of operations
        script: PathBuf,

        /// Stop at the first rejected operation
        #[arg(long)]
        fail_fast: bool,
    },
}

fn init_tracing(level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.to_string().into());

    // Logs go to stderr so stdout stays machine-readable
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = CliConfig::load(cli.config.as_deref()).map_err(CliError::from)?;

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    init_tracing(&level, cli.json || config.logging.json);

    match cli.command {
        Command::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Command::Replay { script, fail_fast } => {
            let operations = script::load_script(&script)?;
            let mut fund = AllowanceFund::from_config(&config.fund).map_err(CliError::from)?;
            info!(
                benefactors = fund.benefactors().len(),
                maximum_allowance = fund.maximum_allowance(),
                operations = operations.len(),
                "Replaying script"
            );

            let report = script::replay(&mut fund, operations, fail_fast)?;
            info!(
                steps = report.steps.len(),
                rejected = report.rejected(),
                active = report.summary.active_allowances.len(),
                "Replay finished"
            );
            println!("{}", serde_json::to_string_pretty(&report)?);

            if !report.invariant_violations.is_empty() {
                anyhow::bail!(
                    "{} invariant violation(s) detected",
                    report.invariant_violations.len()
                );
            }
        }
    }

    Ok(())
}

//! # proclock-cli
//!
//! Command-line driver for the proclock lock scheduler.
//!
//! ## Usage
//!
//! ```bash
//! # Run a lock script and print its reports
//! proclock replay locks.toml
//! proclock --json replay locks.toml
//!
//! # Queue fresh requests behind existing waiters
//! proclock --fair replay locks.toml
//!
//! # Show the effective configuration
//! proclock config --show
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod error;
mod output;

pub use config::Config;
pub use error::CliError;
pub use output::Output;

/// proclock CLI
#[derive(Parser, Debug)]
#[command(name = "proclock")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Config file (default: ~/.proclock/config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Queue fresh requests behind existing waiters
    #[arg(long, global = true)]
    fair: bool,

    #[command(subcommand)]
    command: Commands,
}

/// CLI commands
#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a lock script against a fresh scheduler
    Replay(commands::replay::ReplayCommand),
    /// Show configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = Config::load(cli.config.as_deref()).and_then(|mut config| {
        if let Some(level) = &cli.log_level {
            config.log_level = level.clone();
        }
        if cli.fair {
            config.scheduler.fair_admission = true;
        }
        init_tracing(&config.log_level);

        match cli.command {
            Commands::Replay(cmd) => cmd.execute(&config, cli.json),
            Commands::Config { show } => handle_config(&config, show, cli.json),
        }
    });

    if let Err(e) = result {
        if cli.json {
            println!(
                "{}",
                serde_json::json!({
                    "error": e.to_string(),
                    "success": false
                })
            );
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}

/// Log to stderr so stdout carries only reports
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn handle_config(config: &Config, show: bool, json: bool) -> Result<(), CliError> {
    if show {
        let scheduler = serde_json::to_value(&config.scheduler)?;
        Output::new(json)
            .field("log_level", &config.log_level)
            .field_value("scheduler", scheduler)
            .message(&config.to_toml()?)
            .print();
    } else {
        Output::new(json)
            .message("Use --show to display config")
            .print();
    }

    Ok(())
}

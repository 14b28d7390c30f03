//! warmpool CLI - Command-line interface
//!
//! Validates pool config files and runs pools against a simulated provider.

mod commands;
mod error;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use commands::simulate::SimulateArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "warmpool")]
#[command(version = warmpool::VERSION)]
#[command(about = "Per-key prefetch pools with refill, expiry and cooldown", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a pool config file and print the pools it declares
    Check {
        /// Path to the INI config file
        #[arg(long)]
        config: PathBuf,
    },

    /// Run the configured pools against a simulated flaky provider
    Simulate {
        /// Path to the INI config file
        #[arg(long)]
        config: PathBuf,

        /// How long to run, in seconds
        #[arg(long, default_value = "30")]
        duration: u64,

        /// Fail every N-th fetch (0 never fails)
        #[arg(long, default_value = "4")]
        failure_rate: u64,

        /// Simulated provider latency in milliseconds
        #[arg(long, default_value = "250")]
        latency_ms: u64,

        /// Consume from every pool at this interval, in milliseconds
        #[arg(long, default_value = "1000")]
        consume_every_ms: u64,

        /// Enable debug-level logging regardless of RUST_LOG
        #[arg(long)]
        debug: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let result: Result<(), CliError> = match cli.command {
        Commands::Check { config } => commands::check::run(&config),
        Commands::Simulate {
            config,
            duration,
            failure_rate,
            latency_ms,
            consume_every_ms,
            debug,
        } => commands::simulate::run(SimulateArgs {
            config,
            duration: Duration::from_secs(duration),
            failure_rate,
            latency: Duration::from_millis(latency_ms),
            consume_every: Duration::from_millis(consume_every_ms),
            debug,
        }),
    };

    if let Err(e) = result {
        e.exit();
    }
}

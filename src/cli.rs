use std::{path::PathBuf, sync::OnceLock};

use clap::{Parser, Subcommand};

/// Health checks and auto-recovery for the Redis test container.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to the config file.
    #[arg(short, long, default_value = "redis-watchdog.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run a single health check and print the report.
    Check {
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Exit successfully only if Redis is reachable, retrying once.
    Ensure,
    /// Keep checking in the background until interrupted.
    Watch,
    /// Scan recent container logs for attack signatures.
    Alerts,
    /// Pause the container.
    Pause,
    /// Unpause the container.
    Unpause,
    /// Start the container and wait until it runs.
    Start {
        /// Seconds to wait for the container to be running.
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },
    /// Stop the container.
    Stop {
        /// Seconds the runtime waits before killing the container.
        #[arg(long, default_value_t = 10)]
        timeout: u64,
    },
}

static ARGS: OnceLock<Args> = OnceLock::new();

pub fn get_cli_args() -> &'static Args {
    ARGS.get_or_init(Args::parse)
}

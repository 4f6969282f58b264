//! IronClad CLI
//!
//! Operator and test-harness tool for the IronClad edge agent: inspect
//! persisted readings and raise or clear the fault injection triggers.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use commands::{readings, status, triggers};
use std::path::PathBuf;

/// IronClad edge agent CLI
#[derive(Parser)]
#[command(name = "ironclad")]
#[command(author, version, about = "CLI for the IronClad edge agent", long_about = None)]
pub struct Cli {
    /// Readings database (can also be set via IRONCLAD_DB_PATH env var)
    #[arg(long, env = "IRONCLAD_DB_PATH", default_value = "/opt/iiot_edge/data.db")]
    pub db: PathBuf,

    /// Crash trigger sentinel
    #[arg(
        long,
        env = "IRONCLAD_CRASH_TRIGGER_PATH",
        default_value = "/opt/iiot_edge/trigger_crash"
    )]
    pub crash_trigger: PathBuf,

    /// Freeze trigger sentinel
    #[arg(
        long,
        env = "IRONCLAD_FREEZE_TRIGGER_PATH",
        default_value = "/opt/iiot_edge/trigger_freeze"
    )]
    pub freeze_trigger: PathBuf,

    /// Values above this are WARNING
    #[arg(long, env = "IRONCLAD_WARNING_THRESHOLD", default_value_t = 100.0)]
    pub warning_threshold: f64,

    /// Values above this are CRITICAL
    #[arg(long, env = "IRONCLAD_CRITICAL_THRESHOLD", default_value_t = 120.0)]
    pub critical_threshold: f64,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the most recent readings
    Readings {
        /// Maximum number of readings to show
        #[arg(long, short, default_value_t = 20)]
        limit: usize,
    },

    /// Show aggregate statistics and tier breakdown
    Stats,

    /// Raise a fault injection trigger
    Trigger {
        /// Fault to request
        fault: Fault,
    },

    /// Clear fault injection triggers
    Clear {
        /// Trigger to clear
        #[arg(default_value = "all")]
        target: ClearTarget,
    },

    /// Show trigger state and store summary
    Status,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Fault {
    /// Agent exits with status 1 on its next cycle
    Crash,
    /// Agent hangs without heartbeats on its next cycle
    Freeze,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ClearTarget {
    Crash,
    Freeze,
    All,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = config::Paths::from_cli(&cli)?;

    match cli.command {
        Commands::Readings { limit } => {
            readings::show_readings(&paths, limit, cli.format)?;
        }
        Commands::Stats => {
            readings::show_stats(&paths, cli.format)?;
        }
        Commands::Trigger { fault } => {
            triggers::raise(&paths, fault)?;
        }
        Commands::Clear { target } => {
            triggers::clear(&paths, target)?;
        }
        Commands::Status => {
            status::show_status(&paths, cli.format)?;
        }
    }

    Ok(())
}

//! Command-line argument definitions using clap.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::output::OutputFormat;

/// Certificate inventory across files, live endpoints and cloud stores
///
/// Collectors are addressed by name; `certsweep list` shows them all.
#[derive(Parser, Debug)]
#[command(name = "certsweep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, value_enum)]
    pub format: Option<OutputFormat>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Inventory file (defaults to the user config directory)
    #[arg(short, long, global = true, env = "CERTSWEEP_INVENTORY")]
    pub inventory: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the available collectors
    List,

    /// Run one collector
    Collect(CollectArgs),

    /// Run every collector in the inventory file
    Run(RunArgs),
}

// ============================================================================
// Collect command
// ============================================================================

#[derive(Args, Debug)]
pub struct CollectArgs {
    /// Collector name (see `certsweep list`)
    pub collector: String,

    /// Collector option as KEY=VALUE; JSON values are parsed, anything else is a string
    #[arg(short, long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Environment classification copied onto every record
    #[arg(short, long)]
    pub environment: Option<String>,

    /// Group classification copied onto every record
    #[arg(short, long)]
    pub group: Option<String>,
}

// ============================================================================
// Run command
// ============================================================================

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Only run entries with these names or labels
    #[arg(short, long)]
    pub only: Vec<String>,

    /// Only report certificates expiring within this many days
    #[arg(long, value_name = "DAYS")]
    pub expiring_within: Option<i64>,
}

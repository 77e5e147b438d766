//! CLI argument parsing and command dispatch.

pub mod args;
pub mod commands;

use anyhow::Result;
use args::{Cli, Commands};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Log filter for a `-v` count; `RUST_LOG` wins when set.
pub fn log_filter(verbose: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        })
    })
}

/// Run the CLI application.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries records only
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .ok();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let ctx = commands::Context {
        output_format: cli.format.unwrap_or_default(),
        inventory: cli.inventory,
        no_color: cli.no_color,
    };

    match cli.command {
        Commands::List => commands::list::execute(&ctx),
        Commands::Collect(args) => commands::collect::execute(ctx, args).await,
        Commands::Run(args) => commands::run::execute(ctx, args).await,
    }
}

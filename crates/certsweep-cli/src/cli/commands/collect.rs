//! `certsweep collect` - Run one collector.

use anyhow::{Context as _, Result};
use colored::Colorize;
use tracing::info;

use super::{config_from_pairs, Context};
use crate::cli::args::CollectArgs;
use crate::output::OutputFormat;

pub async fn execute(ctx: Context, args: CollectArgs) -> Result<()> {
    let mut config = config_from_pairs(&args.set)?;
    if let Some(environment) = args.environment {
        config.insert("environment", environment);
    }
    if let Some(group) = args.group {
        config.insert("group", group);
    }

    info!(collector = %args.collector, options = ?config.keys().collect::<Vec<_>>(), "running collector");
    let harvest = ctx
        .registry()
        .execute(&args.collector, &config)
        .await
        .with_context(|| format!("Collector '{}' failed", args.collector))?;

    ctx.print_records(harvest.records(), harvest.skipped().len())?;

    if ctx.output_format == OutputFormat::Table {
        for skipped in harvest.skipped() {
            eprintln!("{} {}: {}", "skipped".yellow(), skipped.item, skipped.reason.dimmed());
        }
    }

    Ok(())
}

//! `certsweep run` - Run every collector in the inventory.

use anyhow::{bail, Result};
use certsweep_core::{CertificateRecord, Harvest, SweepError};
use chrono::Utc;
use colored::Colorize;
use futures_util::future::join_all;
use tracing::info;

use super::Context;
use crate::cli::args::RunArgs;
use crate::config::{Inventory, InventoryEntry};
use crate::output::OutputFormat;

/// Outcome of one inventory entry
#[derive(Debug)]
pub struct EntryOutcome {
    /// Entry label
    pub label: String,
    /// Harvest, or the error that aborted the collector
    pub result: Result<Harvest, SweepError>,
}

/// Entries selected by `--only` (all when empty)
pub fn select<'a>(inventory: &'a Inventory, only: &[String]) -> Vec<&'a InventoryEntry> {
    inventory
        .collectors
        .iter()
        .filter(|e| only.is_empty() || only.iter().any(|o| o == e.label() || o == &e.name))
        .collect()
}

/// Run the selected entries concurrently, one outcome per entry in inventory order
pub async fn run_inventory(ctx: &Context, inventory: &Inventory, only: &[String]) -> Vec<EntryOutcome> {
    let registry = ctx.registry();
    let runs = select(inventory, only).into_iter().map(|entry| {
        let config = entry.config.merged_over(&inventory.defaults);
        async move {
            info!(collector = %entry.name, label = entry.label(), "starting collector");
            EntryOutcome {
                label: entry.label().to_string(),
                result: registry.execute(&entry.name, &config).await,
            }
        }
    });
    join_all(runs).await
}

/// Status line for one entry: record and skipped counts, or the error
pub fn status_line(outcome: &EntryOutcome) -> String {
    match &outcome.result {
        Ok(harvest) => format!(
            "{}: {} records, {} skipped",
            outcome.label,
            harvest.len(),
            harvest.skipped().len()
        ),
        Err(e) => format!("{}: {e}", outcome.label),
    }
}

pub async fn execute(ctx: Context, args: RunArgs) -> Result<()> {
    let inventory = Inventory::load(ctx.inventory.as_deref())?;
    let outcomes = run_inventory(&ctx, &inventory, &args.only).await;
    if outcomes.is_empty() {
        bail!("No collectors selected; check the inventory file and --only filters");
    }

    let now = Utc::now();
    let table = ctx.output_format == OutputFormat::Table;
    let mut records: Vec<CertificateRecord> = Vec::new();
    let mut skipped = 0;
    let mut statuses = Vec::with_capacity(outcomes.len());
    let mut failed = 0;

    for outcome in outcomes {
        let line = status_line(&outcome);
        match outcome.result {
            Ok(harvest) => {
                let detail: Vec<String> = harvest
                    .skipped()
                    .iter()
                    .map(|s| format!("  skipped {}: {}", s.item, s.reason))
                    .collect();
                statuses.push((true, line, detail));
                skipped += harvest.skipped().len();
                records.extend(harvest.into_records());
            }
            Err(_) => {
                statuses.push((false, line, Vec::new()));
                failed += 1;
            }
        }
    }

    if let Some(days) = args.expiring_within {
        records.retain(|r| r.days_remaining(now) <= days);
    }

    ctx.print_records(&records, skipped)?;

    // stderr keeps stdout parseable in JSON mode
    for (ok, line, detail) in &statuses {
        let status = match (*ok, table) {
            (true, true) => "ok".green().bold().to_string(),
            (false, true) => "failed".red().bold().to_string(),
            (true, false) => "ok".to_string(),
            (false, false) => "failed".to_string(),
        };
        eprintln!("{status} {line}");
        if table {
            for skipped in detail {
                eprintln!("{}", skipped.dimmed());
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of the inventory collectors failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory() -> Inventory {
        Inventory::parse(
            r#"
            [[collectors]]
            name = "cert-folder"
            label = "web"
            [collectors.config]
            folders = ["/nonexistent/certsweep-run"]

            [[collectors]]
            name = "no-such-collector"

            [[collectors]]
            name = "postgres-tls"
            [collectors.config]
            data_dir = "/nonexistent/pgdata"
            "#,
        )
        .unwrap()
    }

    fn context() -> Context {
        Context {
            output_format: OutputFormat::Json,
            inventory: None,
            no_color: true,
        }
    }

    #[test]
    fn selection_by_label_or_name() {
        let inventory = inventory();
        assert_eq!(select(&inventory, &[]).len(), 3);
        assert_eq!(select(&inventory, &["web".to_string()]).len(), 1);
        assert_eq!(select(&inventory, &["cert-folder".to_string()]).len(), 1);
        assert!(select(&inventory, &["nothing".to_string()]).is_empty());
    }

    #[tokio::test]
    async fn failures_stay_with_their_entry() {
        let outcomes = run_inventory(&context(), &inventory(), &[]).await;
        assert_eq!(outcomes.len(), 3);

        assert_eq!(outcomes[0].label, "web");
        assert!(matches!(outcomes[0].result, Err(SweepError::Source { .. })));
        assert!(matches!(outcomes[1].result, Err(SweepError::PluginNotFound { .. })));
        assert!(outcomes[2].result.as_ref().is_ok_and(Harvest::is_empty));
    }

    #[tokio::test]
    async fn every_entry_gets_a_status_line() {
        let outcomes = run_inventory(&context(), &inventory(), &[]).await;
        let lines: Vec<String> = outcomes.iter().map(status_line).collect();

        assert!(lines[0].starts_with("web: cert-folder:"), "{}", lines[0]);
        assert!(lines[1].starts_with("no-such-collector: collector 'no-such-collector' not found"));
        assert_eq!(lines[2], "postgres-tls: 0 records, 0 skipped");
    }

    #[test]
    fn status_line_counts_records_and_skips() {
        let mut harvest = Harvest::new("pki-bundle");
        harvest.push(certsweep_core::RecordInput::new().domain("a.example").finish("pki-bundle"));
        harvest.skip("chain.pem#1", "no certificate found in input");
        let outcome = EntryOutcome {
            label: "bundles".to_string(),
            result: Ok(harvest),
        };
        assert_eq!(status_line(&outcome), "bundles: 1 records, 1 skipped");
    }
}

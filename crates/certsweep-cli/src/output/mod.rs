//! Output formatting for certificate records.

use certsweep_core::CertificateRecord;
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::str::FromStr;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Days of validity below which a certificate is flagged
pub const WARN_DAYS: i64 = 30;

/// Available output formats.
#[derive(Debug, Clone, Copy, Default, ValueEnum, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table with colored expiry
    #[default]
    Table,
    /// JSON array of records
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "pretty" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            _ => anyhow::bail!(
                "Unknown output format: {}\n\
                 Valid formats: table, json",
                s
            ),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "Domain")]
    domain: String,
    #[tabled(rename = "Expires")]
    expires: String,
    #[tabled(rename = "Days Left")]
    days_left: String,
    #[tabled(rename = "Issuer")]
    issuer: String,
    #[tabled(rename = "Source")]
    source: String,
}

fn days_left(days: i64) -> String {
    let text = days.to_string();
    if days < 0 {
        text.red().bold().to_string()
    } else if days < WARN_DAYS {
        text.yellow().to_string()
    } else {
        text.green().to_string()
    }
}

/// Render `records` as a table, soonest expiry first
pub fn render_table(records: &[CertificateRecord], now: DateTime<Utc>) -> String {
    let mut sorted: Vec<&CertificateRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.expiration_date);

    let rows: Vec<RecordRow> = sorted
        .into_iter()
        .map(|r| RecordRow {
            domain: r.domain.clone(),
            expires: r.expiration_date.format("%Y-%m-%d").to_string(),
            days_left: days_left(r.days_remaining(now)),
            issuer: r.issuer.clone(),
            source: r.source().to_string(),
        })
        .collect();

    Table::new(&rows).with(Style::rounded()).to_string()
}

/// Render `records` as pretty JSON
pub fn render_json(records: &[CertificateRecord]) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(records)?)
}

/// Records in the requested format
pub fn render(records: &[CertificateRecord], format: OutputFormat, now: DateTime<Utc>) -> anyhow::Result<String> {
    match format {
        OutputFormat::Table => Ok(render_table(records, now)),
        OutputFormat::Json => render_json(records),
    }
}

/// One-line totals for a run
pub fn summary(records: &[CertificateRecord], skipped: usize, now: DateTime<Utc>) -> String {
    let expired = records.iter().filter(|r| r.is_expired(now)).count();
    let expiring = records
        .iter()
        .filter(|r| !r.is_expired(now) && r.days_remaining(now) < WARN_DAYS)
        .count();

    let mut line = format!("{} certificates", records.len().to_string().bold());
    if expired > 0 {
        let _ = write!(line, ", {}", format!("{expired} expired").red());
    }
    if expiring > 0 {
        let _ = write!(line, ", {}", format!("{expiring} expiring within {WARN_DAYS} days").yellow());
    }
    if skipped > 0 {
        let _ = write!(line, ", {}", format!("{skipped} skipped").dimmed());
    }
    line
}

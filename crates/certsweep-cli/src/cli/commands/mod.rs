//! Command implementations.

pub mod collect;
pub mod list;
pub mod run;

use anyhow::{bail, Result};
use certsweep_collectors::Registry;
use certsweep_core::{CertificateRecord, CollectorConfig};
use chrono::Utc;
use serde_json::Value;
use std::path::PathBuf;

use crate::output::{self, OutputFormat};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output format
    pub output_format: OutputFormat,

    /// Inventory file override
    pub inventory: Option<PathBuf>,

    /// Disable colors
    pub no_color: bool,
}

impl Context {
    /// The process-wide collector registry.
    pub fn registry(&self) -> &'static Registry {
        Registry::global()
    }

    /// Print records plus a totals line in the selected format.
    pub fn print_records(&self, records: &[CertificateRecord], skipped: usize) -> Result<()> {
        let now = Utc::now();
        println!("{}", output::render(records, self.output_format, now)?);
        if self.output_format == OutputFormat::Table {
            println!("{}", output::summary(records, skipped, now));
        }
        Ok(())
    }
}

/// Parse `KEY=VALUE` into a config entry.
///
/// The value is read as JSON when it parses (`true`, `5`, `["a","b"]`);
/// anything else is taken as a plain string.
pub fn parse_option(pair: &str) -> Result<(String, Value)> {
    let Some((key, raw)) = pair.split_once('=') else {
        bail!("Invalid option '{pair}', expected KEY=VALUE");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("Invalid option '{pair}', key is empty");
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

/// Build a collector config from `KEY=VALUE` pairs.
pub fn config_from_pairs(pairs: &[String]) -> Result<CollectorConfig> {
    pairs
        .iter()
        .map(|pair| parse_option(pair))
        .collect::<Result<CollectorConfig>>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn option_values_are_json_or_string() {
        assert_eq!(parse_option("recursive=true").unwrap(), ("recursive".into(), json!(true)));
        assert_eq!(parse_option("timeout_secs=5").unwrap(), ("timeout_secs".into(), json!(5)));
        assert_eq!(
            parse_option(r#"folders=["/a","/b"]"#).unwrap(),
            ("folders".into(), json!(["/a", "/b"]))
        );
        assert_eq!(
            parse_option("config_path=/etc/nginx").unwrap(),
            ("config_path".into(), json!("/etc/nginx"))
        );
        assert_eq!(parse_option("k=a=b").unwrap(), ("k".into(), json!("a=b")));
    }

    #[test]
    fn malformed_options_are_rejected() {
        assert!(parse_option("no-equals").is_err());
        assert!(parse_option("=value").is_err());
    }

    #[test]
    fn pairs_build_a_config() {
        let config =
            config_from_pairs(&["folders=/srv/certs".to_string(), "recursive=yes".to_string()]).unwrap();
        assert_eq!(config.string_list("folders"), vec!["/srv/certs"]);
        assert_eq!(config.bool("recursive"), Some(true));
    }
}

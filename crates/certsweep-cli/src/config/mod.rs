//! Inventory file: which collectors to run and with what options.
//!
//! ```toml
//! [defaults]
//! environment = "production"
//!
//! [[collectors]]
//! name = "cert-folder"
//! label = "web-certs"
//!
//! [collectors.config]
//! folders = ["/etc/ssl/private"]
//! ```

use anyhow::{Context as _, Result};
use certsweep_core::CollectorConfig;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One collector invocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryEntry {
    /// Registered collector name
    pub name: String,

    /// Display label; defaults to the collector name
    #[serde(default)]
    pub label: Option<String>,

    /// Collector options
    #[serde(default)]
    pub config: CollectorConfig,
}

impl InventoryEntry {
    /// Label shown in output and used by `--only`
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

/// Parsed inventory file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Inventory {
    /// Options applied to every entry unless the entry sets them
    #[serde(default)]
    pub defaults: CollectorConfig,

    /// Collector invocations, in file order
    #[serde(default)]
    pub collectors: Vec<InventoryEntry>,
}

impl Inventory {
    /// Default inventory path in the user config directory.
    pub fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "certsweep", "certsweep")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(dirs.config_dir().join("inventory.toml"))
    }

    /// Parse inventory TOML.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load `path`, or the default location when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Could not read inventory {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid inventory {}", path.display()))
    }

    /// Entries with the inventory defaults merged in.
    pub fn resolved(&self) -> Vec<(InventoryEntry, CollectorConfig)> {
        self.collectors
            .iter()
            .map(|entry| (entry.clone(), entry.config.merged_over(&self.defaults)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [defaults]
        environment = "production"
        timeout_secs = 5

        [[collectors]]
        name = "cert-folder"
        label = "web-certs"
        [collectors.config]
        folders = ["/etc/ssl/private"]
        recursive = true

        [[collectors]]
        name = "domain"
        [collectors.config]
        domains = ["example.com", "example.org:8443"]
        environment = "edge"
    "#;

    #[test]
    fn parses_entries_and_defaults() {
        let inventory = Inventory::parse(SAMPLE).unwrap();
        assert_eq!(inventory.collectors.len(), 2);
        assert_eq!(inventory.collectors[0].label(), "web-certs");
        assert_eq!(inventory.collectors[1].label(), "domain");
        assert_eq!(
            inventory.collectors[0].config.string_list("folders"),
            vec!["/etc/ssl/private"]
        );
        assert_eq!(inventory.collectors[0].config.bool("recursive"), Some(true));
    }

    #[test]
    fn entry_options_override_defaults() {
        let resolved = Inventory::parse(SAMPLE).unwrap().resolved();
        let (_, folder) = &resolved[0];
        let (_, domain) = &resolved[1];
        assert_eq!(folder.environment(), Some("production"));
        assert_eq!(folder.u64("timeout_secs"), Some(5));
        assert_eq!(domain.environment(), Some("edge"));
    }

    #[test]
    fn empty_inventory_is_valid() {
        assert!(Inventory::parse("").unwrap().collectors.is_empty());
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = Inventory::load(Some(Path::new("/nonexistent/inventory.toml"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/inventory.toml"));
    }
}

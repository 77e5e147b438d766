//! Operating system CA trust stores.
//!
//! Walks the well-known bundle files and anchor directories of the common
//! Linux distributions. A certificate present in more than one store is
//! reported once, keyed by its SHA-256 fingerprint.

use async_trait::async_trait;
use certsweep_core::{Collector, CollectorConfig, Harvest, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::registry::Builtin;
use crate::support::{finished, harvest_listing, read_file, unseen};

/// Trust store locations probed when `paths` is not configured
pub const CA_STORE_PATHS: &[&str] = &[
    // Arch / Fedora / RHEL bundle
    "/etc/ssl/certs/ca-certificates.crt",
    // Debian / Ubuntu bundle
    "/etc/ssl/certs/ca-bundle.crt",
    // Individual cert directory (Debian/Ubuntu)
    "/etc/ssl/certs",
    // Fedora / RHEL individual certs
    "/etc/pki/tls/certs",
    // SUSE
    "/etc/ssl/ca-bundle.pem",
    // Alpine
    "/etc/ssl/cert.pem",
    // p11-kit trust anchors
    "/etc/ca-certificates/extracted/tls-ca-bundle.pem",
    "/etc/ca-certificates/extracted",
];

const ANCHOR_EXTENSIONS: &[&str] = &["pem", "crt", "cer"];

/// Root certificates from the system trust stores
#[derive(Debug, Default)]
pub struct SystemTrustCollector;

impl Builtin for SystemTrustCollector {
    const NAME: &'static str = "system-trust";
    const DESCRIPTION: &'static str = "List CA certificates from system trust stores";
}

impl SystemTrustCollector {
    fn store_files(store: &Path) -> Vec<PathBuf> {
        if store.is_file() {
            return vec![store.to_path_buf()];
        }
        WalkDir::new(store)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|ext| ANCHOR_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(ext)))
            })
            .collect()
    }
}

#[async_trait]
impl Collector for SystemTrustCollector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    async fn collect(&self, config: &CollectorConfig) -> Result<Harvest> {
        self.validate(config)?;

        let configured = config.string_list("paths");
        let stores: Vec<String> = if configured.is_empty() {
            CA_STORE_PATHS.iter().map(|p| (*p).to_string()).collect()
        } else {
            configured
        };

        let mut seen = HashSet::new();
        let mut harvest = Harvest::new(Self::NAME);
        let mut counter = 0usize;

        for store in &stores {
            let root = Path::new(store);
            if !root.exists() {
                debug!(collector = Self::NAME, path = %store, "trust store not found");
                continue;
            }

            for file in Self::store_files(root) {
                let item = file.display().to_string();
                let text = match read_file(&file).await {
                    Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                    Err(e) => {
                        harvest.skip(item, e);
                        continue;
                    }
                };

                let mut found = Harvest::new(Self::NAME);
                harvest_listing(&mut found, &item, &text, config, |_, input| {
                    counter += 1;
                    input
                        .fallback(format!("trust-cert-{counter}"))
                        .tag("store_path", item.as_str())
                });

                found.retain(|record| unseen(&mut seen, record));
                harvest.extend(found);
            }
        }

        Ok(finished(harvest))
    }
}

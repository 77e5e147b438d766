//! Multi-certificate PEM bundles (CA bundles, chain files).

use async_trait::async_trait;
use certsweep_core::decode::pem_blocks;
use certsweep_core::{Collector, CollectorConfig, DecodeError, Harvest, Result, SweepError};
use std::path::Path;
use tracing::debug;

use crate::registry::Builtin;
use crate::support::{finished, harvest_listing, read_file};

/// Every certificate in one or more PEM bundle files
#[derive(Debug, Default)]
pub struct PkiBundleCollector;

impl Builtin for PkiBundleCollector {
    const NAME: &'static str = "pki-bundle";
    const DESCRIPTION: &'static str = "Parse multi-certificate CA bundles";
    const REQUIRED: &'static [&'static str] = &["bundles"];
}

#[async_trait]
impl Collector for PkiBundleCollector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    fn required_parameters(&self) -> &'static [&'static str] {
        Self::REQUIRED
    }

    async fn collect(&self, config: &CollectorConfig) -> Result<Harvest> {
        self.validate(config)?;

        let bundles = config.string_list("bundles");
        let mut harvest = Harvest::new(Self::NAME);
        let mut missing = 0;

        for bundle in &bundles {
            let path = Path::new(bundle);
            if !path.is_file() {
                missing += 1;
                harvest.skip(bundle.as_str(), "bundle file does not exist");
                continue;
            }

            let text = match read_file(path).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    harvest.skip(bundle.as_str(), e);
                    continue;
                }
            };

            let blocks = pem_blocks(&text).len();
            if blocks == 0 {
                harvest.skip(bundle.as_str(), DecodeError::NoCertificate);
                continue;
            }
            debug!(collector = Self::NAME, bundle = %bundle, blocks, "parsing bundle");

            harvest_listing(&mut harvest, bundle, &text, config, |index, input| {
                input
                    .fallback(format!("pki-cert-{index}"))
                    .tag("bundle_path", bundle.as_str())
                    .tag("bundle_index", index)
            });
        }

        if missing == bundles.len() {
            return Err(SweepError::source(
                Self::NAME,
                "reading bundles",
                format!("none of the configured bundles exist: {}", bundles.join(", ")),
            ));
        }

        Ok(finished(harvest))
    }
}

//! macOS keychains via the `security` tool.

use async_trait::async_trait;
use certsweep_core::{Collector, CollectorConfig, Harvest, Result, SweepError};

use crate::registry::Builtin;
use crate::support::{finished, harvest_listing, run_command};

/// Keychain searched when `keychain` is not configured
pub const DEFAULT_KEYCHAIN: &str = "System.keychain";

/// Exports every certificate of one keychain
#[derive(Debug, Default)]
pub struct MacosKeychainCollector;

impl Builtin for MacosKeychainCollector {
    const NAME: &'static str = "macos-keychain";
    const DESCRIPTION: &'static str = "Extract certificates from a macOS keychain";
}

impl MacosKeychainCollector {
    /// Records for a `security find-certificate -a -p` listing
    pub fn harvest_listing(listing: &str, keychain: &str, config: &CollectorConfig) -> Harvest {
        let mut harvest = Harvest::new(Self::NAME);
        harvest_listing(&mut harvest, keychain, listing, config, |index, input| {
            input
                .fallback(format!("keychain-cert-{index}"))
                .tag("keychain", keychain)
                .tag("keychain_index", index)
        });
        harvest
    }
}

#[async_trait]
impl Collector for MacosKeychainCollector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    async fn collect(&self, config: &CollectorConfig) -> Result<Harvest> {
        self.validate(config)?;

        if !cfg!(target_os = "macos") {
            return Err(SweepError::source(
                Self::NAME,
                "checking platform",
                "the macOS keychain is only available on macOS",
            ));
        }

        let keychain = config.string_or("keychain", DEFAULT_KEYCHAIN);
        let listing = run_command(
            Self::NAME,
            "security",
            &["find-certificate", "-a", "-p", &keychain],
        )
        .await?;

        Ok(finished(Self::harvest_listing(&listing, &keychain, config)))
    }
}

//! Windows certificate stores via PowerShell.

use async_trait::async_trait;
use certsweep_core::{Collector, CollectorConfig, Harvest, Result, SweepError};

use crate::registry::Builtin;
use crate::support::{finished, harvest_listing, run_command};

/// Store read when `store` is not configured
pub const DEFAULT_STORE: &str = "My";

/// Location read when `location` is not configured
pub const DEFAULT_LOCATION: &str = "CurrentUser";

const LOCATIONS: &[&str] = &["CurrentUser", "LocalMachine"];

/// Exports one `Cert:\<location>\<store>` store as PEM
#[derive(Debug, Default)]
pub struct WindowsCertStoreCollector;

impl Builtin for WindowsCertStoreCollector {
    const NAME: &'static str = "windows-certstore";
    const DESCRIPTION: &'static str = "Extract certificates from the Windows certificate store";
}

impl WindowsCertStoreCollector {
    /// Checked `(location, store)` pair from `config`
    pub fn target(config: &CollectorConfig) -> Result<(String, String)> {
        let location = config.string_or("location", DEFAULT_LOCATION);
        let store = config.string_or("store", DEFAULT_STORE);

        let Some(location) = LOCATIONS
            .iter()
            .find(|l| l.eq_ignore_ascii_case(&location))
            .map(|l| (*l).to_string())
        else {
            return Err(SweepError::source(
                Self::NAME,
                "checking store location",
                format!("unknown location '{location}', expected CurrentUser or LocalMachine"),
            ));
        };

        if !store.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SweepError::source(
                Self::NAME,
                "checking store name",
                format!("invalid store name '{store}'"),
            ));
        }
        Ok((location, store))
    }

    /// PowerShell that prints every certificate of the store as PEM
    pub fn export_script(location: &str, store: &str) -> String {
        format!(
            "Get-ChildItem -Path 'Cert:\\{location}\\{store}' | ForEach-Object {{ \
             $b64 = [Convert]::ToBase64String($_.RawData, 'InsertLineBreaks'); \
             Write-Output \"-----BEGIN CERTIFICATE-----`n$b64`n-----END CERTIFICATE-----\" }}"
        )
    }

    /// Records for an exported PEM listing
    pub fn harvest_listing(listing: &str, location: &str, store: &str, config: &CollectorConfig) -> Harvest {
        let mut harvest = Harvest::new(Self::NAME);
        let item = format!("Cert:\\{location}\\{store}");
        harvest_listing(&mut harvest, &item, listing, config, |index, input| {
            input
                .fallback(format!("windows-cert-{index}"))
                .tag("windows_store", store)
                .tag("windows_location", location)
                .tag("cert_index", index)
        });
        harvest
    }
}

#[async_trait]
impl Collector for WindowsCertStoreCollector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    async fn collect(&self, config: &CollectorConfig) -> Result<Harvest> {
        self.validate(config)?;

        if !cfg!(windows) {
            return Err(SweepError::source(
                Self::NAME,
                "checking platform",
                "the Windows certificate store is only available on Windows",
            ));
        }

        let (location, store) = Self::target(config)?;
        let script = Self::export_script(&location, &store);
        let listing = run_command(
            Self::NAME,
            "powershell",
            &["-NoProfile", "-NonInteractive", "-Command", &script],
        )
        .await?;

        Ok(finished(Self::harvest_listing(&listing, &location, &store, config)))
    }
}

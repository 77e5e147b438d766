//! Java keystores and PKCS#12 bundles.
//!
//! `.p12`/`.pfx` files are decoded in memory. `.jks` files are listed with
//! `keytool -list -rfc`. Any other extension is tried as PKCS#12 first and
//! handed to keytool when that fails.

use async_trait::async_trait;
use certsweep_core::decode::{decode_der, pem_blocks};
use certsweep_core::{
    CertificateRecord, Collector, CollectorConfig, DecodeError, Harvest, RecordInput, Result,
    SweepError,
};
use p12_keystore::{KeyStore, KeyStoreEntry};
use std::path::Path;
use tracing::debug;

use crate::registry::Builtin;
use crate::support::{decoded_block, finished, read_file, run_command};

/// Environment variable holding the store password when none is configured
pub const PASSWORD_ENV: &str = "KEYSTORE_PASSWORD";

/// Password of a stock JDK keystore
pub const DEFAULT_PASSWORD: &str = "changeit";

/// Every certificate stored in one or more keystores
#[derive(Debug, Default)]
pub struct KeystoreCollector;

impl Builtin for KeystoreCollector {
    const NAME: &'static str = "keystore";
    const DESCRIPTION: &'static str = "Extract certificates from Java keystores (.jks, .p12, .pfx)";
    const REQUIRED: &'static [&'static str] = &["keystores"];
}

/// Container format, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeystoreFormat {
    Pkcs12,
    Jks,
    Unknown,
}

impl KeystoreFormat {
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("p12" | "pfx") => Self::Pkcs12,
            Some("jks") => Self::Jks,
            _ => Self::Unknown,
        }
    }
}

/// Store password: the `password` option, then `env`, then [`DEFAULT_PASSWORD`]
pub fn resolve_password(config: &CollectorConfig, env: Option<String>) -> String {
    config
        .str("password")
        .map(str::to_string)
        .or_else(|| env.filter(|p| !p.is_empty()))
        .unwrap_or_else(|| DEFAULT_PASSWORD.to_string())
}

/// Fallback identity for a certificate without a common name
pub fn fallback_identity(path: &Path, alias: &str) -> String {
    let file = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    format!("{file}-{alias}")
}

/// Certificates of a PKCS#12 keystore, paired with their alias
pub fn pkcs12_entries(data: &[u8], password: &str) -> Result<Vec<(String, RecordInput)>> {
    let store = KeyStore::from_pkcs12(data, password)
        .map_err(|e| DecodeError::Keystore(e.to_string()))?;

    let mut found = Vec::new();
    for (alias, entry) in store.entries() {
        let certificates = match entry {
            KeyStoreEntry::PrivateKeyChain(chain) => chain.chain(),
            KeyStoreEntry::Certificate(cert) => std::slice::from_ref(cert),
            #[allow(unreachable_patterns)]
            _ => continue,
        };
        for cert in certificates {
            let decoded = decode_der(cert.as_der())?;
            found.push((alias.to_string(), RecordInput::from_decoded(&decoded)));
        }
    }
    Ok(found)
}

/// Alias and `CERTIFICATE` blocks of each entry in `keytool -list -rfc` output
pub fn keytool_entries(listing: &str) -> Vec<(String, Vec<&str>)> {
    listing
        .split("Alias name:")
        .skip(1)
        .map(|section| {
            let alias = section.lines().next().unwrap_or_default().trim().to_string();
            (alias, pem_blocks(section))
        })
        .collect()
}

async fn jks_entries(path: &Path, password: &str) -> Result<Vec<(String, RecordInput)>> {
    let keystore = path.display().to_string();
    let listing = run_command(
        KeystoreCollector::NAME,
        "keytool",
        &["-list", "-rfc", "-keystore", &keystore, "-storepass", password],
    )
    .await?;

    let mut found = Vec::new();
    for (alias, blocks) in keytool_entries(&listing) {
        for block in blocks {
            found.push((alias.clone(), decoded_block(block)?));
        }
    }
    Ok(found)
}

async fn keystore_records(
    path: &Path,
    password: &str,
    config: &CollectorConfig,
) -> Result<Vec<CertificateRecord>> {
    let entries = match KeystoreFormat::from_path(path) {
        KeystoreFormat::Pkcs12 => pkcs12_entries(&read_file(path).await?, password)?,
        KeystoreFormat::Jks => jks_entries(path, password).await?,
        KeystoreFormat::Unknown => {
            let data = read_file(path).await?;
            match pkcs12_entries(&data, password) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!(collector = KeystoreCollector::NAME, path = %path.display(), error = %e, "not PKCS#12, trying keytool");
                    jks_entries(path, password).await?
                }
            }
        }
    };

    if entries.is_empty() {
        return Err(DecodeError::NoCertificate.into());
    }

    let keystore = path.display().to_string();
    Ok(entries
        .into_iter()
        .map(|(alias, input)| {
            input
                .fallback(fallback_identity(path, &alias))
                .tag("keystore_path", keystore.as_str())
                .tag("keystore_alias", alias)
                .classify(config)
                .finish(KeystoreCollector::NAME)
        })
        .collect())
}

#[async_trait]
impl Collector for KeystoreCollector {
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

        let keystores = config.string_list("keystores");
        let password = resolve_password(config, std::env::var(PASSWORD_ENV).ok());
        let mut harvest = Harvest::new(Self::NAME);
        let mut missing = 0;

        for keystore in &keystores {
            let path = Path::new(keystore);
            if !path.is_file() {
                missing += 1;
                harvest.skip(keystore.as_str(), "keystore file does not exist");
                continue;
            }
            debug!(collector = Self::NAME, keystore = %keystore, format = ?KeystoreFormat::from_path(path), "opening keystore");
            harvest.absorb_many(
                keystore.as_str(),
                keystore_records(path, &password, config).await,
            );
        }

        if missing == keystores.len() {
            return Err(SweepError::source(
                Self::NAME,
                "reading keystores",
                format!("none of the configured keystores exist: {}", keystores.join(", ")),
            ));
        }

        Ok(finished(harvest))
    }
}

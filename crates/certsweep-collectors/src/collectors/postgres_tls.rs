//! PostgreSQL server TLS certificate.

use async_trait::async_trait;
use certsweep_core::{CertificateRecord, Collector, CollectorConfig, Harvest, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::registry::Builtin;
use crate::support::{decoded_input, finished, read_file};

/// Data directory used when `data_dir` is not configured
pub const DEFAULT_DATA_DIR: &str = "/var/lib/postgresql/data";

const DEFAULT_CERT_FILE: &str = "server.crt";

/// Reads the certificate a PostgreSQL server is configured to present
#[derive(Debug, Default)]
pub struct PostgresTlsCollector;

impl Builtin for PostgresTlsCollector {
    const NAME: &'static str = "postgres-tls";
    const DESCRIPTION: &'static str = "Extract the TLS certificate from PostgreSQL configuration";
}

/// Value of an uncommented `ssl_cert_file` setting in `postgresql.conf` text
pub fn ssl_cert_file_setting(conf: &str) -> Option<String> {
    conf.lines()
        .map(|line| line.split_once('#').map_or(line, |(code, _)| code).trim())
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            (key.trim() == "ssl_cert_file").then(|| value.trim().trim_matches('\'').to_string())
        })
        .filter(|v| !v.is_empty())
        .last()
}

impl PostgresTlsCollector {
    /// Certificate path: explicit `cert_file`, then `postgresql.conf`, then `server.crt`
    async fn cert_path(config: &CollectorConfig) -> PathBuf {
        if let Some(explicit) = config.str("cert_file") {
            return PathBuf::from(explicit);
        }

        let data_dir = PathBuf::from(config.string_or("data_dir", DEFAULT_DATA_DIR));
        let conf = data_dir.join("postgresql.conf");
        if let Ok(text) = tokio::fs::read_to_string(&conf).await {
            if let Some(setting) = ssl_cert_file_setting(&text) {
                debug!(collector = Self::NAME, conf = %conf.display(), %setting, "using ssl_cert_file");
                return data_dir.join(setting);
            }
        }
        data_dir.join(DEFAULT_CERT_FILE)
    }

    async fn read_record(cert_path: &Path, config: &CollectorConfig) -> Result<CertificateRecord> {
        let bytes = read_file(cert_path).await?;
        Ok(decoded_input(&bytes)?
            .fallback("postgresql-server")
            .tag("cert_path", cert_path.display().to_string())
            .tag("service", "postgresql")
            .classify(config)
            .finish(Self::NAME))
    }
}

#[async_trait]
impl Collector for PostgresTlsCollector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    async fn collect(&self, config: &CollectorConfig) -> Result<Harvest> {
        self.validate(config)?;

        let mut harvest = Harvest::new(Self::NAME);
        let cert_path = Self::cert_path(config).await;
        if !cert_path.is_file() {
            debug!(collector = Self::NAME, path = %cert_path.display(), "no server certificate");
            return Ok(finished(harvest));
        }

        let result = Self::read_record(&cert_path, config).await;
        harvest.absorb(cert_path.display().to_string(), result);

        Ok(finished(harvest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssl_cert_file_lookup() {
        let conf = "\
            # ssl_cert_file = 'commented.crt'\n\
            ssl = on\n\
            ssl_cert_file = 'tls/server.pem'   # trailing\n";
        assert_eq!(ssl_cert_file_setting(conf).as_deref(), Some("tls/server.pem"));
        assert_eq!(ssl_cert_file_setting("ssl = on\n"), None);
    }

    #[tokio::test]
    async fn absent_certificate_yields_empty_harvest() {
        let cfg = CollectorConfig::new().with("data_dir", "/nonexistent/pgdata");
        let harvest = PostgresTlsCollector.collect(&cfg).await.unwrap();
        assert!(harvest.is_empty());
        assert!(harvest.skipped().is_empty());
    }
}

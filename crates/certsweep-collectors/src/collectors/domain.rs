//! Live TLS endpoints.
//!
//! Each configured endpoint is probed with a full handshake and the leaf
//! certificate it presents is decoded. Certificate verification is off, so
//! expired and self-signed certificates are reported like any other.

use async_trait::async_trait;
use certsweep_client::{parse_endpoint, TlsProbe};
use certsweep_core::decode::decode_der;
use certsweep_core::{
    CertificateRecord, Collector, CollectorConfig, Harvest, RecordInput, Result, SweepError,
};
use std::time::Duration;
use tracing::debug;

use crate::registry::Builtin;
use crate::support::{finished, proxy_setting};

/// Default per-endpoint deadline in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Probes `host[:port]` endpoints over TLS
#[derive(Debug, Default)]
pub struct DomainCollector;

impl Builtin for DomainCollector {
    const NAME: &'static str = "domain";
    const DESCRIPTION: &'static str = "Fetch certificates from live TLS endpoints";
    const REQUIRED: &'static [&'static str] = &["domains"];
}

impl DomainCollector {
    /// Probe deadline: `timeout_ms` wins over `timeout_secs`
    pub fn timeout(config: &CollectorConfig) -> Duration {
        config.u64("timeout_ms").map_or_else(
            || Duration::from_secs(config.u64("timeout_secs").unwrap_or(DEFAULT_TIMEOUT_SECS)),
            Duration::from_millis,
        )
    }

    /// Probe one endpoint and build its record.
    ///
    /// Connection, handshake and timeout failures surface as
    /// [`SweepError::Source`] naming the endpoint.
    pub async fn probe_endpoint(
        &self,
        endpoint: &str,
        config: &CollectorConfig,
    ) -> Result<CertificateRecord> {
        let probing = || format!("probing {endpoint}");
        let (host, port) =
            parse_endpoint(endpoint).map_err(|e| SweepError::source(Self::NAME, probing(), e))?;

        let probe =
            TlsProbe::new(Self::timeout(config)).with_proxy(proxy_setting(Self::NAME, config)?);
        debug!(collector = Self::NAME, %host, port, timeout = ?probe.timeout(), "probing endpoint");
        let der = probe
            .peer_certificate(&host, port)
            .await
            .map_err(|e| SweepError::source(Self::NAME, probing(), e))?;

        let cert = decode_der(&der)?;
        let subject = cert.subject_cn.clone().unwrap_or_else(|| host.clone());

        Ok(RecordInput::from_decoded(&cert)
            .domain(host.as_str())
            .subject(subject)
            .tag("endpoint", format!("{host}:{port}"))
            .tag("port", port)
            .classify(config)
            .finish(Self::NAME))
    }
}

#[async_trait]
impl Collector for DomainCollector {
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

        let mut harvest = Harvest::new(Self::NAME);
        for endpoint in config.string_list("domains") {
            let result = self.probe_endpoint(&endpoint, config).await;
            harvest.absorb(endpoint, result);
        }

        Ok(finished(harvest))
    }
}

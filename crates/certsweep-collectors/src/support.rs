//! Helpers shared by the collector implementations.

use certsweep_client::{HttpTransport, HttpTransportBuilder, ProxyConfig};
use certsweep_core::decode::{self, pem_blocks};
use certsweep_core::{
    is_truthy, CertificateRecord, CollectorConfig, Harvest, RecordInput, Result, SweepError,
};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Read a whole file, mapping failures to an item-level I/O error
pub async fn read_file(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| SweepError::io(path.display().to_string(), e))
}

/// Decode the first certificate in `bytes` into a normalization input
pub fn decoded_input(bytes: &[u8]) -> Result<RecordInput> {
    let cert = decode::decode_first(bytes)?;
    Ok(RecordInput::from_decoded(&cert))
}

/// Decode one PEM block into a normalization input
pub fn decoded_block(block: &str) -> Result<RecordInput> {
    let cert = decode::decode_pem(block)?;
    Ok(RecordInput::from_decoded(&cert))
}

/// Turn every `CERTIFICATE` block of a text listing into records.
///
/// `build` receives the block index and the decoded input and returns the
/// finished input (tags, fallback identity). Blocks that fail to decode are
/// skipped under `{item}#{index}`.
pub fn harvest_listing(
    harvest: &mut Harvest,
    item: &str,
    listing: &str,
    config: &CollectorConfig,
    mut build: impl FnMut(usize, RecordInput) -> RecordInput,
) {
    let source = harvest.source.clone();
    for (index, block) in pem_blocks(listing).into_iter().enumerate() {
        let result = decoded_block(block)
            .map(|input| build(index, input).classify(config).finish(&source));
        harvest.absorb(format!("{item}#{index}"), result);
    }
}

/// Run an enumeration command, failing the source on spawn error or non-zero exit
pub async fn run_command(collector: &str, program: &str, args: &[&str]) -> Result<String> {
    debug!(collector, program, ?args, "running enumeration command");
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| SweepError::source(collector, format!("running {program}"), e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(SweepError::source(
            collector,
            format!("running {program}"),
            format!("exited with {}: {stderr}", output.status),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Proxy routing from the `proxy` option.
///
/// Absent (or `true`) follows the environment, a falsy value or `"none"`
/// connects directly, anything else is parsed as a proxy URL.
pub fn proxy_setting(collector: &str, config: &CollectorConfig) -> Result<Option<ProxyConfig>> {
    match config.get("proxy") {
        None => Ok(ProxyConfig::from_env()),
        Some(value) if !is_truthy(value) => Ok(None),
        Some(_) => match config.str("proxy") {
            Some(raw) if raw.eq_ignore_ascii_case("none") => Ok(None),
            Some(raw) => ProxyConfig::parse(raw)
                .map(Some)
                .map_err(|e| SweepError::source(collector, "configuring proxy", e)),
            None => Ok(ProxyConfig::from_env()),
        },
    }
}

/// Transport builder honoring the `proxy` and `timeout_secs` options
pub fn transport_builder(collector: &str, config: &CollectorConfig) -> Result<HttpTransportBuilder> {
    let mut builder = HttpTransport::builder().proxy(proxy_setting(collector, config)?);
    if let Some(secs) = config.u64("timeout_secs") {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    Ok(builder)
}

/// Finish a transport builder, failing the source on error
pub fn build_transport(collector: &str, builder: HttpTransportBuilder) -> Result<HttpTransport> {
    builder
        .build()
        .map_err(|e| SweepError::source(collector, "building HTTP client", e))
}

/// Seconds since the epoch (possibly fractional) to a UTC timestamp
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn epoch_to_utc(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
}

/// Value of the first `CN=` attribute in a distinguished name string
pub fn common_name(dn: &str) -> Option<String> {
    dn.split([',', '/'])
        .map(str::trim)
        .find_map(|part| {
            let (key, value) = part.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("CN")
                .then(|| value.trim().to_string())
        })
        .filter(|cn| !cn.is_empty())
}

/// Log the per-run totals and hand the harvest back
pub fn finished(harvest: Harvest) -> Harvest {
    info!(
        collector = %harvest.source,
        records = harvest.len(),
        skipped = harvest.skipped().len(),
        "collection finished"
    );
    harvest
}

/// Records whose fingerprint has not been seen yet
pub fn unseen(
    seen: &mut std::collections::HashSet<String>,
    record: &CertificateRecord,
) -> bool {
    record
        .fingerprint256
        .as_ref()
        .map_or(true, |fp| seen.insert(fp.clone()))
}

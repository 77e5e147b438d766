//! Normalized certificate record and the loose input it is built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::decode::DecodedCertificate;
use crate::types::CollectorConfig;

/// Issuer used when a source cannot name one.
pub const UNKNOWN_ISSUER: &str = "Unknown";

/// One certificate as discovered from one source at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    /// Primary subject identity, never empty
    pub domain: String,
    /// Issuer common name or organization
    pub issuer: String,
    /// Not valid after
    pub expiration_date: DateTime<Utc>,
    /// Not valid before
    pub valid_from: DateTime<Utc>,
    /// Subject identity, defaults to `domain`
    pub subject: String,
    /// Subject alternative names, never empty
    pub san: Vec<String>,
    /// SHA-1 digest of the DER encoding
    pub fingerprint: Option<String>,
    /// SHA-256 digest of the DER encoding
    pub fingerprint256: Option<String>,
    /// Serial in whatever notation the source uses
    pub serial_number: Option<String>,
    /// Provenance metadata; always carries `source`
    pub tags: BTreeMap<String, Value>,
}

impl CertificateRecord {
    /// Name of the collector that produced this record
    #[must_use]
    pub fn source(&self) -> &str {
        self.tags.get("source").and_then(Value::as_str).unwrap_or_default()
    }

    /// Whole days until expiry relative to `now` (negative once expired)
    #[must_use]
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.expiration_date - now).num_days()
    }

    /// Whether the certificate has expired at `now`
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date < now
    }
}

/// Loosely populated certificate metadata as a collector finds it.
///
/// Every field is optional; [`RecordInput::normalize`] fills the gaps.
#[derive(Debug, Clone, Default)]
pub struct RecordInput {
    /// Subject identity reported by the source
    pub domain: Option<String>,
    /// Source-scoped synthetic identity (file name, alias, index)
    pub fallback_domain: Option<String>,
    /// Issuer name
    pub issuer: Option<String>,
    /// Not valid after
    pub expiration_date: Option<DateTime<Utc>>,
    /// Not valid before
    pub valid_from: Option<DateTime<Utc>>,
    /// Subject identity if it differs from `domain`
    pub subject: Option<String>,
    /// Subject alternative names
    pub san: Vec<String>,
    /// SHA-1 fingerprint
    pub fingerprint: Option<String>,
    /// SHA-256 fingerprint
    pub fingerprint256: Option<String>,
    /// Serial number
    pub serial_number: Option<String>,
    /// Caller classification
    pub environment: Option<String>,
    /// Caller classification
    pub group: Option<String>,
    /// Source-specific provenance
    pub tags: BTreeMap<String, Value>,
    /// Caller free-form tags, applied last
    pub caller_tags: BTreeMap<String, Value>,
}

impl RecordInput {
    /// Empty input
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a decoded certificate.
    ///
    /// Uses the subject common name as both domain and subject and the
    /// issuer common name (or organization) as issuer.
    #[must_use]
    pub fn from_decoded(cert: &DecodedCertificate) -> Self {
        Self {
            domain: cert.subject_cn.clone(),
            issuer: cert.issuer_name().map(str::to_string),
            expiration_date: Some(cert.not_after),
            valid_from: Some(cert.not_before),
            subject: cert.subject_cn.clone(),
            san: cert.san.clone(),
            fingerprint: Some(cert.sha1_fingerprint.clone()),
            fingerprint256: Some(cert.sha256_fingerprint.clone()),
            serial_number: Some(cert.serial.clone()),
            ..Self::default()
        }
    }

    /// Set the reported domain
    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Set the synthetic identity used when no domain is known
    #[must_use]
    pub fn fallback(mut self, identity: impl Into<String>) -> Self {
        self.fallback_domain = Some(identity.into());
        self
    }

    /// Set the issuer
    #[must_use]
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Set the subject
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the validity window
    #[must_use]
    pub fn validity(
        mut self,
        valid_from: Option<DateTime<Utc>>,
        expiration_date: Option<DateTime<Utc>>,
    ) -> Self {
        self.valid_from = valid_from;
        self.expiration_date = expiration_date;
        self
    }

    /// Replace the SAN list
    #[must_use]
    pub fn san(mut self, san: Vec<String>) -> Self {
        self.san = san;
        self
    }

    /// Set the serial number
    #[must_use]
    pub fn serial(mut self, serial: impl Into<String>) -> Self {
        self.serial_number = Some(serial.into());
        self
    }

    /// Add a source-specific tag
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Copy caller classification (`environment`, `group`, `tags`) from `config`
    #[must_use]
    pub fn classify(mut self, config: &CollectorConfig) -> Self {
        self.environment = config.environment().map(str::to_string);
        self.group = config.group().map(str::to_string);
        self.caller_tags = config.tags();
        self
    }

    /// Normalize against the current time
    #[must_use]
    pub fn finish(self, source: &str) -> CertificateRecord {
        self.normalize(source, Utc::now())
    }

    /// Build the canonical record; never fails.
    ///
    /// Tag precedence, lowest first: `environment`/`group`, source-specific
    /// tags, caller tags. `source` is always the producing collector.
    #[must_use]
    pub fn normalize(self, source: &str, now: DateTime<Utc>) -> CertificateRecord {
        let domain = non_blank(self.domain)
            .or_else(|| non_blank(self.fallback_domain))
            .unwrap_or_else(|| format!("{source}-certificate"));
        let issuer = non_blank(self.issuer).unwrap_or_else(|| UNKNOWN_ISSUER.to_string());
        let subject = non_blank(self.subject).unwrap_or_else(|| domain.clone());

        let mut san: Vec<String> = Vec::with_capacity(self.san.len());
        for name in self.san {
            let name = name.trim().to_string();
            if !name.is_empty() && !san.contains(&name) {
                san.push(name);
            }
        }
        if san.is_empty() {
            san.push(domain.clone());
        }

        let (valid_from, expiration_date) = match (self.valid_from, self.expiration_date) {
            (Some(from), Some(until)) if until >= from => (from, until),
            (Some(from), Some(until)) => (until, from),
            (Some(from), None) => (from, from.max(now)),
            (None, Some(until)) => (until.min(now), until),
            (None, None) => (now, now),
        };

        let mut tags = BTreeMap::new();
        if let Some(env) = self.environment {
            tags.insert("environment".to_string(), Value::String(env));
        }
        if let Some(group) = self.group {
            tags.insert("group".to_string(), Value::String(group));
        }
        tags.extend(self.tags);
        tags.extend(self.caller_tags);
        tags.insert("source".to_string(), Value::String(source.to_string()));

        CertificateRecord {
            domain,
            issuer,
            expiration_date,
            valid_from,
            subject,
            san,
            fingerprint: non_blank(self.fingerprint),
            fingerprint256: non_blank(self.fingerprint256),
            serial_number: non_blank(self.serial_number),
            tags,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn empty_input_degrades_to_defaults() {
        let now = at(2025, 3, 1);
        let record = RecordInput::new().normalize("pki-bundle", now);
        assert_eq!(record.domain, "pki-bundle-certificate");
        assert_eq!(record.issuer, UNKNOWN_ISSUER);
        assert_eq!(record.subject, record.domain);
        assert_eq!(record.san, vec![record.domain.clone()]);
        assert_eq!(record.valid_from, now);
        assert_eq!(record.expiration_date, now);
        assert_eq!(record.serial_number, None);
        assert_eq!(record.source(), "pki-bundle");
    }

    #[test]
    fn fallback_identity_used_for_blank_domain() {
        let record = RecordInput::new()
            .domain("   ")
            .fallback("pki-cert-3")
            .normalize("pki-bundle", at(2025, 1, 1));
        assert_eq!(record.domain, "pki-cert-3");
        assert_eq!(record.san, vec!["pki-cert-3"]);
    }

    #[test]
    fn san_is_deduplicated_in_order() {
        let record = RecordInput::new()
            .domain("example.com")
            .san(vec![
                "www.example.com".into(),
                "example.com".into(),
                "www.example.com".into(),
                String::new(),
            ])
            .normalize("domain", at(2025, 1, 1));
        assert_eq!(record.san, vec!["www.example.com", "example.com"]);
    }

    #[test]
    fn validity_window_is_never_inverted() {
        let now = at(2025, 6, 1);
        let swapped = RecordInput::new()
            .validity(Some(at(2026, 1, 1)), Some(at(2025, 1, 1)))
            .normalize("aws-acm", now);
        assert!(swapped.expiration_date >= swapped.valid_from);

        let only_end = RecordInput::new()
            .validity(None, Some(at(2025, 1, 1)))
            .normalize("aws-acm", now);
        assert_eq!(only_end.valid_from, at(2025, 1, 1));
        assert!(only_end.expiration_date >= only_end.valid_from);

        let only_start = RecordInput::new()
            .validity(Some(at(2024, 1, 1)), None)
            .normalize("aws-acm", now);
        assert_eq!(only_start.expiration_date, now);
    }

    #[test]
    fn tag_precedence_keeps_source_authoritative() {
        let config = CollectorConfig::new()
            .with("environment", "prod")
            .with("group", "payments")
            .with("tags", json!({"group": "checkout", "source": "spoofed", "owner": "sre"}));
        let record = RecordInput::new()
            .domain("pay.example.com")
            .tag("file_name", "pay.pem")
            .tag("environment", "lab")
            .classify(&config)
            .normalize("cert-folder", at(2025, 1, 1));

        assert_eq!(record.tags["source"], json!("cert-folder"));
        assert_eq!(record.tags["group"], json!("checkout"));
        assert_eq!(record.tags["owner"], json!("sre"));
        assert_eq!(record.tags["file_name"], json!("pay.pem"));
        assert_eq!(record.tags["environment"], json!("lab"));
    }

    #[test]
    fn missing_classification_is_omitted() {
        let record = RecordInput::new()
            .domain("a.example")
            .classify(&CollectorConfig::new())
            .normalize("domain", at(2025, 1, 1));
        assert!(!record.tags.contains_key("environment"));
        assert!(!record.tags.contains_key("group"));
        assert_eq!(record.tags.len(), 1);
    }

    #[test]
    fn expiry_helpers() {
        let record = RecordInput::new()
            .validity(Some(at(2024, 1, 1)), Some(at(2024, 3, 1)))
            .normalize("domain", at(2024, 2, 1));
        assert_eq!(record.days_remaining(at(2024, 2, 20)), 10);
        assert!(!record.is_expired(at(2024, 2, 20)));
        assert!(record.is_expired(at(2024, 3, 2)));
    }
}

//! AWS Certificate Manager.
//!
//! Talks to the ACM JSON API directly: every request is a signed
//! `POST /` carrying an `X-Amz-Target` action. Listing pages through
//! `NextToken`; each certificate is then described individually, and a
//! failed describe only skips that certificate.

use async_trait::async_trait;
use certsweep_client::sigv4::{self, Credentials, SigningRequest};
use certsweep_client::HttpTransport;
use certsweep_core::{
    CertificateRecord, Collector, CollectorConfig, Harvest, RecordInput, Result, SweepError,
    TransportError,
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::registry::Builtin;
use crate::support::{build_transport, epoch_to_utc, finished, transport_builder};

/// Region used when `region` is not configured
pub const DEFAULT_REGION: &str = "us-east-1";

const SERVICE: &str = "acm";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const LIST_TARGET: &str = "CertificateManager.ListCertificates";
const DESCRIBE_TARGET: &str = "CertificateManager.DescribeCertificate";

/// Inventories ACM certificates in one region
#[derive(Debug, Default)]
pub struct AwsAcmCollector;

impl Builtin for AwsAcmCollector {
    const NAME: &'static str = "aws-acm";
    const DESCRIPTION: &'static str = "Extract certificates from AWS Certificate Manager";
    const REQUIRED: &'static [&'static str] = &["access_key_id", "secret_access_key"];
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListCertificatesResponse {
    #[serde(default)]
    certificate_summary_list: Vec<CertificateSummary>,
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CertificateSummary {
    certificate_arn: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeCertificateResponse {
    certificate: CertificateDetail,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CertificateDetail {
    certificate_arn: String,
    domain_name: Option<String>,
    #[serde(default)]
    subject_alternative_names: Vec<String>,
    issuer: Option<String>,
    subject: Option<String>,
    serial: Option<String>,
    not_before: Option<f64>,
    not_after: Option<f64>,
    status: Option<String>,
    #[serde(rename = "Type")]
    kind: Option<String>,
    key_algorithm: Option<String>,
}

/// Signed JSON-RPC client for one ACM endpoint
struct AcmClient {
    http: HttpTransport,
    credentials: Credentials,
    region: String,
    url: String,
    host: String,
}

impl AcmClient {
    fn from_config(config: &CollectorConfig) -> Result<Self> {
        let region = config.string_or("region", DEFAULT_REGION);
        let (url, host) = match config.str("endpoint") {
            Some(endpoint) => {
                let parsed = Url::parse(endpoint).map_err(|e| {
                    SweepError::source(AwsAcmCollector::NAME, "parsing endpoint", e)
                })?;
                let host = match (parsed.host_str(), parsed.port()) {
                    (Some(h), Some(p)) => format!("{h}:{p}"),
                    (Some(h), None) => h.to_string(),
                    (None, _) => {
                        return Err(SweepError::source(
                            AwsAcmCollector::NAME,
                            "parsing endpoint",
                            format!("{endpoint} has no host"),
                        ))
                    }
                };
                (endpoint.trim_end_matches('/').to_string(), host)
            }
            None => {
                let host = sigv4::service_host(SERVICE, &region);
                (format!("https://{host}"), host)
            }
        };

        let http = build_transport(
            AwsAcmCollector::NAME,
            transport_builder(AwsAcmCollector::NAME, config)?,
        )?;

        Ok(Self {
            http,
            credentials: Credentials::new(
                config.string_or("access_key_id", ""),
                config.string_or("secret_access_key", ""),
            ),
            region,
            url,
            host,
        })
    }

    async fn call<T: DeserializeOwned>(&self, target: &str, payload: &Value) -> std::result::Result<T, TransportError> {
        let body = serde_json::to_vec(payload).map_err(|e| TransportError::Body(e.to_string()))?;
        let request = SigningRequest::json_rpc(&self.host, SERVICE, &self.region, target, &body);
        let signed = sigv4::sign(&self.credentials, &request, Utc::now());

        let mut builder = self
            .http
            .post(&format!("{}/", self.url))
            .header("Content-Type", CONTENT_TYPE);
        for (name, value) in signed.pairs() {
            builder = builder.header(name, value);
        }
        self.http.json(builder.body(body)).await
    }

    async fn list_arns(&self) -> Result<Vec<String>> {
        let mut arns = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let payload = next_token
                .as_ref()
                .map_or_else(|| json!({}), |token| json!({ "NextToken": token }));
            let page: ListCertificatesResponse = self
                .call(LIST_TARGET, &payload)
                .await
                .map_err(|e| SweepError::source(AwsAcmCollector::NAME, "listing certificates", e))?;

            debug!(
                collector = AwsAcmCollector::NAME,
                page = page.certificate_summary_list.len(),
                "listed certificates"
            );
            arns.extend(page.certificate_summary_list.into_iter().map(|s| s.certificate_arn));

            match page.next_token.filter(|t| !t.is_empty()) {
                Some(token) => next_token = Some(token),
                None => return Ok(arns),
            }
        }
    }

    async fn describe(&self, arn: &str, config: &CollectorConfig) -> Result<CertificateRecord> {
        let response: DescribeCertificateResponse = self
            .call(DESCRIBE_TARGET, &json!({ "CertificateArn": arn }))
            .await?;
        Ok(record_from_detail(response.certificate, &self.region, config))
    }
}

fn record_from_detail(detail: CertificateDetail, region: &str, config: &CollectorConfig) -> CertificateRecord {
    let mut input = RecordInput::new()
        .issuer(detail.issuer.unwrap_or_else(|| "Amazon".to_string()))
        .validity(
            detail.not_before.and_then(epoch_to_utc),
            detail.not_after.and_then(epoch_to_utc),
        )
        .san(detail.subject_alternative_names)
        .tag("aws_arn", detail.certificate_arn.as_str())
        .tag("aws_region", region);

    if let Some(domain) = detail.domain_name {
        input = input.domain(domain);
    }
    if let Some(subject) = detail.subject {
        input = input.subject(subject);
    }
    if let Some(serial) = detail.serial {
        input = input.serial(serial);
    }
    for (key, value) in [
        ("aws_status", detail.status),
        ("aws_type", detail.kind),
        ("aws_key_algorithm", detail.key_algorithm),
    ] {
        if let Some(value) = value {
            input = input.tag(key, value);
        }
    }

    let fallback = detail
        .certificate_arn
        .rsplit('/')
        .next()
        .unwrap_or(&detail.certificate_arn)
        .to_string();
    input.fallback(fallback).classify(config).finish(AwsAcmCollector::NAME)
}

#[async_trait]
impl Collector for AwsAcmCollector {
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

        let client = AcmClient::from_config(config)?;
        let arns = client.list_arns().await?;

        let mut harvest = Harvest::new(Self::NAME);
        for arn in arns {
            let result = client.describe(&arn, config).await;
            harvest.absorb(arn, result);
        }

        Ok(finished(harvest))
    }
}

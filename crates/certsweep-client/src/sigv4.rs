//! AWS Signature Version 4 for JSON-RPC style APIs.
//!
//! Signs `POST /` requests carrying an `X-Amz-Target` header. The signer is
//! pure: it only produces header values; sending the request is the
//! caller's job.

use chrono::{DateTime, Utc};
use ring::digest::{digest, SHA256};
use ring::hmac;

/// Signature algorithm identifier
pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Headers covered by the signature, in canonical order
pub const SIGNED_HEADERS: &str = "host;x-amz-date;x-amz-target";

/// Long-lived access key pair
#[derive(Clone)]
pub struct Credentials {
    /// Access key id
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
}

impl Credentials {
    /// Create a credential pair
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// The parts of a request that enter the signature
#[derive(Debug, Clone)]
pub struct SigningRequest<'a> {
    /// HTTP method
    pub method: &'a str,
    /// Absolute URI path
    pub path: &'a str,
    /// Value of the `host` header
    pub host: &'a str,
    /// Service name in the credential scope (`acm`)
    pub service: &'a str,
    /// Region name in the credential scope
    pub region: &'a str,
    /// `X-Amz-Target` value (`CertificateManager.ListCertificates`)
    pub target: &'a str,
    /// Exact body bytes
    pub payload: &'a [u8],
}

impl<'a> SigningRequest<'a> {
    /// A `POST /` JSON-RPC request to `{service}.{region}.amazonaws.com`
    pub const fn json_rpc(
        host: &'a str,
        service: &'a str,
        region: &'a str,
        target: &'a str,
        payload: &'a [u8],
    ) -> Self {
        Self {
            method: "POST",
            path: "/",
            host,
            service,
            region,
            target,
            payload,
        }
    }
}

/// Header values to attach to the outbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    /// `X-Amz-Date`
    pub amz_date: String,
    /// `X-Amz-Target`
    pub target: String,
    /// `Authorization`
    pub authorization: String,
    /// Hex signature, also embedded in `authorization`
    pub signature: String,
}

impl SignedHeaders {
    /// Header name/value pairs in the order they were signed
    pub fn pairs(&self) -> [(&'static str, &str); 3] {
        [
            ("X-Amz-Date", self.amz_date.as_str()),
            ("X-Amz-Target", self.target.as_str()),
            ("Authorization", self.authorization.as_str()),
        ]
    }
}

/// Default endpoint host for a regional service
pub fn service_host(service: &str, region: &str) -> String {
    format!("{service}.{region}.amazonaws.com")
}

/// `YYYYMMDD'T'HHMMSS'Z'` timestamp
pub fn amz_date(now: DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Lowercase hex SHA-256
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(digest(&SHA256, data))
}

/// Canonical request string for `request` at `amz_date`
pub fn canonical_request(request: &SigningRequest<'_>, amz_date: &str) -> String {
    let canonical_headers = format!(
        "host:{}\nx-amz-date:{}\nx-amz-target:{}\n",
        request.host, amz_date, request.target
    );
    format!(
        "{}\n{}\n\n{}\n{}\n{}",
        request.method,
        request.path,
        canonical_headers,
        SIGNED_HEADERS,
        sha256_hex(request.payload)
    )
}

/// `{date}/{region}/{service}/aws4_request`
pub fn credential_scope(date_stamp: &str, region: &str, service: &str) -> String {
    format!("{date_stamp}/{region}/{service}/aws4_request")
}

/// Four chained HMAC-SHA256 steps from the secret to the signing key
pub fn signing_key(secret: &str, date_stamp: &str, region: &str, service: &str) -> hmac::Tag {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_sha256(k_date.as_ref(), region.as_bytes());
    let k_service = hmac_sha256(k_region.as_ref(), service.as_bytes());
    hmac_sha256(k_service.as_ref(), b"aws4_request")
}

/// Sign `request` with `credentials` at `now`
pub fn sign(
    credentials: &Credentials,
    request: &SigningRequest<'_>,
    now: DateTime<Utc>,
) -> SignedHeaders {
    let amz_date = amz_date(now);
    let date_stamp = &amz_date[..8];
    let scope = credential_scope(date_stamp, request.region, request.service);

    let canonical = canonical_request(request, &amz_date);
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        sha256_hex(canonical.as_bytes())
    );

    let key = signing_key(
        &credentials.secret_access_key,
        date_stamp,
        request.region,
        request.service,
    );
    let signature = hex::encode(hmac_sha256(key.as_ref(), string_to_sign.as_bytes()));

    let authorization = format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}",
        credentials.access_key_id
    );

    SignedHeaders {
        amz_date,
        target: request.target.to_string(),
        authorization,
        signature,
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> hmac::Tag {
    hmac::sign(&hmac::Key::new(hmac::HMAC_SHA256, key), data)
}

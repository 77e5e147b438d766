//! Azure Key Vault certificates.
//!
//! Authenticates with the client-credentials flow, pages through the
//! vault's certificate list and fetches each certificate bundle. When the
//! bundle carries the DER body (`cer`) it is decoded natively; otherwise the
//! record is built from the attributes and policy metadata.

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use certsweep_client::HttpTransport;
use certsweep_core::decode::decode_der;
use certsweep_core::{
    CertificateRecord, Collector, CollectorConfig, Harvest, RecordInput, Result, SweepError,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::registry::Builtin;
use crate::support::{build_transport, common_name, epoch_to_utc, finished, transport_builder};

/// Token authority used when `authority_host` is not configured
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Key Vault REST API version
pub const API_VERSION: &str = "7.4";

const VAULT_SCOPE: &str = "https://vault.azure.net/.default";
const DEFAULT_ISSUER: &str = "Azure Key Vault";
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

type TokenKey = (String, String, String);

#[derive(Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Inventories the certificates of one Key Vault
#[derive(Default)]
pub struct AzureKeyVaultCollector {
    tokens: Mutex<HashMap<TokenKey, CachedToken>>,
}

impl std::fmt::Debug for AzureKeyVaultCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureKeyVaultCollector").finish_non_exhaustive()
    }
}

impl Builtin for AzureKeyVaultCollector {
    const NAME: &'static str = "azure-keyvault";
    const DESCRIPTION: &'static str = "Extract certificates from Azure Key Vault";
    const REQUIRED: &'static [&'static str] =
        &["vault_name", "client_id", "client_secret", "tenant_id"];
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<Value>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CertificateListPage {
    #[serde(default)]
    value: Vec<CertificateItem>,
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CertificateItem {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct Attributes {
    enabled: Option<bool>,
    nbf: Option<f64>,
    exp: Option<f64>,
    created: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct SubjectAlternativeNames {
    #[serde(default)]
    dns_names: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct X509Properties {
    subject: Option<String>,
    #[serde(default, alias = "subject_alternative_names")]
    sans: SubjectAlternativeNames,
}

#[derive(Debug, Default, Deserialize)]
struct IssuerParameters {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CertificatePolicy {
    #[serde(default, alias = "x509_certificate_properties")]
    x509_props: X509Properties,
    #[serde(default, alias = "issuer_parameters")]
    issuer: IssuerParameters,
}

#[derive(Debug, Deserialize)]
struct CertificateBundle {
    id: String,
    cer: Option<String>,
    x5t: Option<String>,
    #[serde(default)]
    attributes: Attributes,
    #[serde(default)]
    policy: CertificatePolicy,
}

/// Certificate name from a Key Vault certificate identifier
pub fn certificate_name(id: &str) -> &str {
    let mut segments = id.trim_end_matches('/').split('/');
    segments
        .by_ref()
        .find(|s| *s == "certificates")
        .and_then(|_| segments.next())
        .or_else(|| id.trim_end_matches('/').rsplit('/').next())
        .unwrap_or(id)
}

/// Base64url SHA-1 thumbprint to colon-delimited uppercase hex
pub fn thumbprint_hex(x5t: &str) -> Option<String> {
    let raw = URL_SAFE_NO_PAD.decode(x5t.trim_end_matches('=')).ok()?;
    let hex = hex::encode_upper(raw);
    Some(
        hex.as_bytes()
            .chunks(2)
            .map(|pair| String::from_utf8_lossy(pair).into_owned())
            .collect::<Vec<_>>()
            .join(":"),
    )
}

struct VaultSettings {
    vault_name: String,
    vault_url: String,
    authority: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

impl VaultSettings {
    fn from_config(config: &CollectorConfig) -> Self {
        let vault_name = config.string_or("vault_name", "");
        let vault_url = config
            .str("vault_url")
            .map_or_else(|| format!("https://{vault_name}.vault.azure.net"), str::to_string);
        Self {
            vault_url: vault_url.trim_end_matches('/').to_string(),
            authority: config
                .string_or("authority_host", DEFAULT_AUTHORITY)
                .trim_end_matches('/')
                .to_string(),
            tenant_id: config.string_or("tenant_id", ""),
            client_id: config.string_or("client_id", ""),
            client_secret: config.string_or("client_secret", ""),
            vault_name,
        }
    }

    fn token_key(&self) -> TokenKey {
        (self.authority.clone(), self.tenant_id.clone(), self.client_id.clone())
    }
}

impl AzureKeyVaultCollector {
    async fn access_token(&self, http: &HttpTransport, settings: &VaultSettings) -> Result<String> {
        let key = settings.token_key();
        let mut tokens = self.tokens.lock().await;
        if let Some(cached) = tokens.get(&key) {
            if cached.expires_at > Utc::now() {
                debug!(collector = Self::NAME, "reusing cached access token");
                return Ok(cached.value.clone());
            }
        }

        let url = format!("{}/{}/oauth2/v2.0/token", settings.authority, settings.tenant_id);
        let form = [
            ("client_id", settings.client_id.as_str()),
            ("client_secret", settings.client_secret.as_str()),
            ("scope", VAULT_SCOPE),
            ("grant_type", "client_credentials"),
        ];
        let response: TokenResponse = http
            .json(http.post(&url).form(&form))
            .await
            .map_err(|e| SweepError::source(Self::NAME, "acquiring access token", e))?;

        let Some(token) = response.access_token.filter(|t| !t.is_empty()) else {
            return Err(SweepError::source(
                Self::NAME,
                "acquiring access token",
                response
                    .error_description
                    .unwrap_or_else(|| "token response carried no access_token".to_string()),
            ));
        };

        let lifetime = response
            .expires_in
            .as_ref()
            .and_then(|v| v.as_i64().or_else(|| v.as_str()?.parse().ok()))
            .unwrap_or(0);
        tokens.insert(
            key,
            CachedToken {
                value: token.clone(),
                expires_at: Utc::now()
                    + ChronoDuration::seconds(lifetime - TOKEN_REFRESH_MARGIN_SECS),
            },
        );
        Ok(token)
    }

    async fn list_ids(http: &HttpTransport, settings: &VaultSettings, token: &str) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut next = Some(format!(
            "{}/certificates?api-version={API_VERSION}",
            settings.vault_url
        ));

        while let Some(url) = next {
            let page: CertificateListPage = http
                .json(http.get(&url).bearer_auth(token))
                .await
                .map_err(|e| SweepError::source(Self::NAME, "listing certificates", e))?;
            ids.extend(page.value.into_iter().map(|item| item.id));
            next = page.next_link.filter(|link| !link.is_empty());
        }
        Ok(ids)
    }

    async fn fetch(
        http: &HttpTransport,
        id: &str,
        token: &str,
        settings: &VaultSettings,
        config: &CollectorConfig,
    ) -> Result<CertificateRecord> {
        let url = format!("{id}?api-version={API_VERSION}");
        let bundle: CertificateBundle = http.json(http.get(&url).bearer_auth(token)).await?;
        record_from_bundle(bundle, &settings.vault_name, config)
    }
}

fn record_from_bundle(
    bundle: CertificateBundle,
    vault_name: &str,
    config: &CollectorConfig,
) -> Result<CertificateRecord> {
    let name = certificate_name(&bundle.id).to_string();
    let attributes = bundle.attributes;

    let input = match bundle.cer.as_deref().filter(|c| !c.is_empty()) {
        Some(cer) => {
            let der = STANDARD
                .decode(cer)
                .map_err(|e| certsweep_core::DecodeError::Pem(format!("cer: {e}")))?;
            RecordInput::from_decoded(&decode_der(&der)?)
        }
        None => {
            let props = bundle.policy.x509_props;
            let mut input = RecordInput::new()
                .issuer(
                    bundle
                        .policy
                        .issuer
                        .name
                        .unwrap_or_else(|| DEFAULT_ISSUER.to_string()),
                )
                .validity(
                    attributes.nbf.and_then(epoch_to_utc),
                    attributes.exp.and_then(epoch_to_utc),
                )
                .san(props.sans.dns_names);
            if let Some(cn) = props.subject.as_deref().and_then(common_name) {
                input = input.domain(cn.as_str()).subject(cn);
            }
            input.fingerprint = bundle.x5t.as_deref().and_then(thumbprint_hex);
            input
        }
    };

    let mut input = input
        .fallback(name)
        .tag("azure_vault", vault_name)
        .tag("azure_cert_id", bundle.id.as_str());
    if let Some(enabled) = attributes.enabled {
        input = input.tag("azure_enabled", enabled);
    }
    if let Some(created) = attributes.created.and_then(epoch_to_utc) {
        input = input.tag("azure_created", created.to_rfc3339());
    }
    Ok(input.classify(config).finish(AzureKeyVaultCollector::NAME))
}

#[async_trait]
impl Collector for AzureKeyVaultCollector {
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

        let settings = VaultSettings::from_config(config);
        let http = build_transport(Self::NAME, transport_builder(Self::NAME, config)?)?;
        let token = self.access_token(&http, &settings).await?;
        let ids = Self::list_ids(&http, &settings, &token).await?;
        debug!(collector = Self::NAME, vault = %settings.vault_name, certificates = ids.len(), "listed vault");

        let mut harvest = Harvest::new(Self::NAME);
        for id in ids {
            let result = Self::fetch(&http, &id, &token, &settings, config).await;
            harvest.absorb(id, result);
        }

        Ok(finished(harvest))
    }
}

//! JSON-over-HTTPS transport shared by the API-backed collectors.

use certsweep_core::TransportError;
use reqwest::{Client as HttpClient, RequestBuilder};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::proxy::ProxyConfig;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// User-Agent sent with every request
pub const USER_AGENT: &str = concat!("certsweep/", env!("CARGO_PKG_VERSION"));

/// HTTP transport with status mapping and proxy routing
#[derive(Clone)]
pub struct HttpTransport {
    inner: Arc<TransportInner>,
}

struct TransportInner {
    http: HttpClient,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a builder for custom configuration
    #[must_use]
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::new()
    }

    /// Start a GET request
    pub fn get(&self, url: &str) -> RequestBuilder {
        debug!(url = %url, "GET request");
        self.inner.http.get(url)
    }

    /// Start a POST request
    pub fn post(&self, url: &str) -> RequestBuilder {
        debug!(url = %url, "POST request");
        self.inner.http.post(url)
    }

    /// Send `request` and decode a JSON success body
    pub async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, TransportError> {
        let response = request.send().await.map_err(|e| self.map_send_error(&e))?;
        let status = response.status();

        if status.is_success() {
            let body = response
                .bytes()
                .await
                .map_err(|e| TransportError::Http(e.to_string()))?;
            serde_json::from_slice(&body).map_err(|e| TransportError::Body(e.to_string()))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(status_error(status.as_u16(), &body))
        }
    }

    fn map_send_error(&self, e: &reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout(self.inner.timeout)
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Http(e.to_string())
        }
    }
}

/// Map a non-success response to a [`TransportError`].
///
/// Pulls a message from the common JSON error shapes (`{"message"}`,
/// `{"error": "..."}`, `{"error": {"message"}}`, `{"__type"}`) and falls back
/// to the raw body.
pub fn status_error(status: u16, body: &str) -> TransportError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| error_message(&v))
        .unwrap_or_else(|| body.trim().to_string());

    if status == 429 {
        warn!(status, "rate limited by remote service");
    }
    match status {
        401 | 403 => TransportError::Unauthorized { status, message },
        _ => TransportError::Status { status, message },
    }
}

fn error_message(value: &serde_json::Value) -> Option<String> {
    let text = |v: &serde_json::Value| v.as_str().map(String::from);
    value
        .get("message")
        .or_else(|| value.get("Message"))
        .and_then(text)
        .or_else(|| value.get("error").and_then(text))
        .or_else(|| value.pointer("/error/message").and_then(text))
        .or_else(|| value.get("error_description").and_then(text))
        .or_else(|| value.get("__type").and_then(text))
}

/// Builder for configuring an [`HttpTransport`]
pub struct HttpTransportBuilder {
    timeout: Duration,
    proxy: Option<ProxyConfig>,
    root_certificates: Vec<Vec<u8>>,
    identity_pem: Option<Vec<u8>>,
    accept_invalid_certs: bool,
}

impl HttpTransportBuilder {
    /// Builder with defaults and the environment proxy
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            proxy: ProxyConfig::from_env(),
            root_certificates: Vec::new(),
            identity_pem: None,
            accept_invalid_certs: false,
        }
    }

    /// Set the request timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override proxy routing; `None` forces direct connections
    #[must_use]
    pub fn proxy(mut self, proxy: Option<ProxyConfig>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Trust an extra PEM-encoded CA
    #[must_use]
    pub fn root_certificate_pem(mut self, pem: Vec<u8>) -> Self {
        self.root_certificates.push(pem);
        self
    }

    /// Present a client certificate (PEM certificate followed by its key)
    #[must_use]
    pub fn identity_pem(mut self, pem: Vec<u8>) -> Self {
        self.identity_pem = Some(pem);
        self
    }

    /// Skip server certificate verification
    #[must_use]
    pub const fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Build the transport
    pub fn build(self) -> Result<HttpTransport, TransportError> {
        let mut builder = HttpClient::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .gzip(true)
            .danger_accept_invalid_certs(self.accept_invalid_certs);

        builder = match &self.proxy {
            Some(proxy) => proxy.apply(builder)?,
            None => builder.no_proxy(),
        };

        for pem in &self.root_certificates {
            let cert = reqwest::Certificate::from_pem(pem)
                .map_err(|e| TransportError::Tls(format!("invalid CA certificate: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }

        if let Some(pem) = &self.identity_pem {
            let identity = reqwest::Identity::from_pem(pem)
                .map_err(|e| TransportError::Tls(format!("invalid client identity: {e}")))?;
            builder = builder.identity(identity);
        }

        let http = builder
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;

        Ok(HttpTransport {
            inner: Arc::new(TransportInner {
                http,
                timeout: self.timeout,
            }),
        })
    }
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//! Live TLS endpoint probing.
//!
//! Completes a handshake with a host and returns the leaf certificate it
//! presented. Verification is disabled: expired, self-signed and mismatched
//! certificates are exactly what an inventory needs to see.

use certsweep_core::TransportError;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, instrument};

use crate::proxy::ProxyConfig;

/// Default port for endpoints given without one
pub const DEFAULT_PORT: u16 = 443;

/// Recommended probe deadline
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_PROXY_RESPONSE: usize = 16 * 1024;

/// Split `host[:port]`, `[v6]:port` or an `https://` URL into host and port.
///
/// Any path, query or fragment after the authority is dropped. Schemes
/// other than `https` are rejected.
pub fn parse_endpoint(endpoint: &str) -> Result<(String, u16), TransportError> {
    let raw = endpoint.trim();
    let rest = match raw.split_once("://") {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("https") => rest,
        Some((scheme, _)) => {
            return Err(TransportError::InvalidUrl(format!(
                "{raw}: unsupported scheme '{scheme}', expected https"
            )))
        }
        None => raw,
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    if authority.is_empty() {
        return Err(TransportError::InvalidUrl(format!("'{raw}': empty endpoint")));
    }

    let invalid_port = |p: &str| TransportError::InvalidUrl(format!("{raw}: invalid port '{p}'"));

    if let Some(inner) = authority.strip_prefix('[') {
        let (host, tail) = inner
            .split_once(']')
            .ok_or_else(|| TransportError::InvalidUrl(format!("{raw}: unterminated IPv6 literal")))?;
        let port = match tail.strip_prefix(':') {
            Some(p) => p.parse().map_err(|_| invalid_port(p))?,
            None if tail.is_empty() => DEFAULT_PORT,
            None => return Err(invalid_port(tail)),
        };
        return Ok((host.to_string(), port));
    }

    match authority.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => {
            if host.is_empty() {
                return Err(TransportError::InvalidUrl(format!("{raw}: missing host")));
            }
            let port = port.parse().map_err(|_| invalid_port(port))?;
            Ok((host.to_string(), port))
        }
        _ => Ok((authority.to_string(), DEFAULT_PORT)),
    }
}

/// TLS handshake client that captures the peer certificate
#[derive(Debug, Clone)]
pub struct TlsProbe {
    timeout: Duration,
    proxy: Option<ProxyConfig>,
}

impl TlsProbe {
    /// Probe with `timeout` and the environment proxy
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            proxy: ProxyConfig::from_env(),
        }
    }

    /// Override proxy routing; `None` connects directly
    #[must_use]
    pub fn with_proxy(mut self, proxy: Option<ProxyConfig>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Deadline applied to connect plus handshake
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// DER bytes of the leaf certificate presented by `host:port`.
    ///
    /// The whole exchange runs under one deadline; expiry yields
    /// [`TransportError::Timeout`].
    #[instrument(skip(self), fields(timeout = ?self.timeout))]
    pub async fn peer_certificate(&self, host: &str, port: u16) -> Result<Vec<u8>, TransportError> {
        tokio::time::timeout(self.timeout, self.handshake(host, port))
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))?
    }

    async fn handshake(&self, host: &str, port: u16) -> Result<Vec<u8>, TransportError> {
        let stream = match &self.proxy {
            Some(proxy) => tunnel(proxy, host, port).await?,
            None => TcpStream::connect((host, port))
                .await
                .map_err(|e| TransportError::Connect(format!("{host}:{port}: {e}")))?,
        };

        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| TransportError::Tls(format!("invalid server name '{host}': {e}")))?;
        let connector = TlsConnector::from(Arc::new(client_config()?));
        let tls = connector
            .connect(server_name, stream)
            .await
            .map_err(|e| TransportError::Tls(e.to_string()))?;

        let (_, session) = tls.get_ref();
        let leaf = session
            .peer_certificates()
            .and_then(|certs| certs.first())
            .ok_or(TransportError::NoPeerCertificate)?;
        debug!(host, port, bytes = leaf.len(), "captured peer certificate");
        Ok(leaf.as_ref().to_vec())
    }
}

impl Default for TlsProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

fn client_config() -> Result<ClientConfig, TransportError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| TransportError::Tls(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
        .with_no_client_auth();
    Ok(config)
}

/// Open a `CONNECT` tunnel to `host:port` through `proxy`
async fn tunnel(proxy: &ProxyConfig, host: &str, port: u16) -> Result<TcpStream, TransportError> {
    debug!(proxy = %proxy.host(), host, port, "opening CONNECT tunnel");
    let mut stream = TcpStream::connect((proxy.host(), proxy.port()))
        .await
        .map_err(|e| TransportError::Proxy(format!("connect to {}: {e}", proxy.host())))?;

    stream
        .write_all(proxy.connect_request(host, port).as_bytes())
        .await
        .map_err(|e| TransportError::Proxy(e.to_string()))?;

    let mut response = Vec::with_capacity(256);
    let mut buf = [0u8; 512];
    while !response.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream
            .read(&mut buf)
            .await
            .map_err(|e| TransportError::Proxy(e.to_string()))?;
        if n == 0 {
            return Err(TransportError::Proxy("proxy closed connection during CONNECT".into()));
        }
        response.extend_from_slice(&buf[..n]);
        if response.len() > MAX_PROXY_RESPONSE {
            return Err(TransportError::Proxy("oversized CONNECT response".into()));
        }
    }

    let head = String::from_utf8_lossy(&response);
    let status_line = head.lines().next().unwrap_or_default();
    let status = status_line.split_whitespace().nth(1).unwrap_or_default();
    if status != "200" {
        return Err(TransportError::Proxy(format!("CONNECT refused: {status_line}")));
    }
    Ok(stream)
}

#[derive(Debug)]
struct AcceptAnyCertificate;

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}

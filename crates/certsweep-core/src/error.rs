use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Result type alias for certsweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

/// Boxed cause carried by [`SweepError::Source`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by collectors and the registry
#[derive(Error, Debug)]
pub enum SweepError {
    /// A required configuration parameter is absent or falsy
    #[error("required parameter '{parameter}' missing for {collector} collector")]
    Configuration {
        /// Collector that rejected the configuration
        collector: String,
        /// First missing parameter
        parameter: String,
    },

    /// The source itself could not be reached, authenticated or enumerated
    #[error("{collector}: {context}: {cause}")]
    Source {
        /// Collector whose source failed
        collector: String,
        /// What the collector was doing
        context: String,
        /// Underlying failure
        #[source]
        cause: BoxError,
    },

    /// A single certificate blob could not be decoded
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A single item could not be fetched
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Reading a single file failed
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path being read
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// No collector is registered under the requested name
    #[error("collector '{name}' not found (available: {})", available.join(", "))]
    PluginNotFound {
        /// Requested name
        name: String,
        /// Names that are registered
        available: Vec<String>,
    },

    /// A registered factory produced a collector that does not honor its registration
    #[error("collector registered as '{registered}' reports itself as '{reported}'")]
    InvalidPlugin {
        /// Name in the registration table
        registered: String,
        /// Name the instance reports
        reported: String,
    },
}

impl SweepError {
    /// Wrap a source-level failure for `collector`
    pub fn source(
        collector: impl Into<String>,
        context: impl Into<String>,
        cause: impl Into<BoxError>,
    ) -> Self {
        Self::Source {
            collector: collector.into(),
            context: context.into(),
            cause: cause.into(),
        }
    }

    /// Build an I/O error for `path`
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true if the failure (or its wrapped cause) is a timeout
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.transport().is_some_and(TransportError::is_timeout)
    }

    /// Returns true if the failure (or its wrapped cause) is an authentication rejection
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        self.transport()
            .is_some_and(|e| matches!(e, TransportError::Unauthorized { .. }))
    }

    fn transport(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Source { cause, .. } => cause.downcast_ref::<TransportError>(),
            _ => None,
        }
    }
}

/// A certificate blob that could not be decoded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Input contained no certificate
    #[error("no certificate found in input")]
    NoCertificate,

    /// PEM armor or its base64 payload is malformed
    #[error("invalid PEM: {0}")]
    Pem(String),

    /// Base64 payload from an API is malformed
    #[error("invalid base64: {0}")]
    Base64(String),

    /// Keystore container could not be opened or read
    #[error("unreadable keystore: {0}")]
    Keystore(String),

    /// DER structure is not an X.509 certificate
    #[error("invalid X.509 certificate: {0}")]
    X509(String),

    /// notAfter precedes notBefore
    #[error("validity window inverted: not_after {not_after} precedes not_before {not_before}")]
    InvertedValidity {
        /// Start of validity
        not_before: DateTime<Utc>,
        /// End of validity
        not_after: DateTime<Utc>,
    },
}

/// Failures of the transport collaborator (HTTP API calls, TLS probes)
#[derive(Error, Debug)]
pub enum TransportError {
    /// Operation did not finish within its deadline
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// TCP connection could not be established
    #[error("connection failed: {0}")]
    Connect(String),

    /// TLS handshake failed
    #[error("TLS handshake failed: {0}")]
    Tls(String),

    /// Handshake completed but no certificate was presented
    #[error("peer presented no certificate")]
    NoPeerCertificate,

    /// The remote service rejected the credentials or signature
    #[error("authentication rejected (HTTP {status}): {message}")]
    Unauthorized {
        /// HTTP status code
        status: u16,
        /// Error message from the service
        message: String,
    },

    /// Non-success HTTP status
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Error message from the service
        message: String,
    },

    /// Request could not be sent or the response not read
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Proxy refused or mangled the tunnel
    #[error("proxy error: {0}")]
    Proxy(String),

    /// Response body did not have the expected shape
    #[error("unexpected response body: {0}")]
    Body(String),

    /// A URL could not be built or parsed
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl TransportError {
    /// Returns true if this is a timeout
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Returns the HTTP status code if the service answered
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { status, .. } | Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

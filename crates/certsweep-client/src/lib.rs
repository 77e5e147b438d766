//! Transport plumbing for certsweep collectors.
//!
//! - [`sigv4`]: request signing for signature-verifying cloud APIs
//! - [`proxy`]: the `HTTPS_PROXY`/`HTTP_PROXY` routing convention
//! - [`http`]: JSON transport with status mapping
//! - [`probe`]: live TLS handshakes that capture the peer certificate

pub mod http;
pub mod probe;
pub mod proxy;
pub mod sigv4;

pub use http::{HttpTransport, HttpTransportBuilder};
pub use probe::{parse_endpoint, TlsProbe};
pub use proxy::ProxyConfig;
pub use sigv4::{Credentials, SignedHeaders, SigningRequest};

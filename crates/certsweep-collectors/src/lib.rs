//! Built-in certificate collectors and the registry that serves them.
//!
//! Every collector implements [`certsweep_core::Collector`] and is listed in
//! [`BUILTIN`]. Callers resolve collectors by name through a [`Registry`]:
//!
//! ```rust,ignore
//! use certsweep_collectors::Registry;
//! use certsweep_core::CollectorConfig;
//!
//! let config = CollectorConfig::new().with("folders", serde_json::json!(["/etc/ssl/private"]));
//! let harvest = Registry::global().execute("cert-folder", &config).await?;
//! for record in harvest.records() {
//!     println!("{} expires {}", record.domain, record.expiration_date);
//! }
//! ```
//!
//! | Name | Source |
//! |------|--------|
//! | `aws-acm` | AWS Certificate Manager |
//! | `azure-keyvault` | Azure Key Vault |
//! | `cert-folder` | PEM/DER files in directories |
//! | `domain` | Live TLS endpoints |
//! | `k8s-secrets` | Kubernetes TLS secrets |
//! | `keystore` | Java keystores and PKCS#12 files |
//! | `macos-keychain` | macOS keychains |
//! | `nginx` | nginx `ssl_certificate` directives |
//! | `pki-bundle` | Multi-certificate PEM bundles |
//! | `postgres-tls` | PostgreSQL server certificate |
//! | `system-trust` | OS CA trust stores |
//! | `windows-certstore` | Windows certificate stores |

pub mod collectors;
pub mod registry;
mod support;

pub use collectors::*;
pub use registry::{Builtin, Registration, Registry, BUILTIN};

//! Core types and traits for certsweep.
//!
//! This crate provides the pieces every certificate source shares:
//!
//! - **Records**: the canonical [`CertificateRecord`] and the lenient
//!   [`RecordInput`] it is normalized from
//! - **Contract**: the [`Collector`] trait and its [`CollectorConfig`]
//! - **Outcomes**: [`Harvest`], which keeps per-item failures out of the
//!   fatal error path
//! - **Decoding**: native X.509 parsing in [`decode`]
//! - **Errors**: [`SweepError`] and its collaborator errors
//!
//! # Example
//!
//! ```rust,ignore
//! use certsweep_core::{decode, RecordInput};
//!
//! let cert = decode::decode_pem(pem_text)?;
//! let record = RecordInput::from_decoded(&cert)
//!     .tag("file_name", "site.pem")
//!     .finish("cert-folder");
//! println!("{} expires {}", record.domain, record.expiration_date);
//! ```

mod collector;
pub mod decode;
mod error;
pub mod types;

pub use collector::{validate_required, Collector};
pub use decode::DecodedCertificate;
pub use error::{BoxError, DecodeError, Result, SweepError, TransportError};
pub use types::*;

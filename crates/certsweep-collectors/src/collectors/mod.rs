//! Collector implementations, one module per source.

mod aws_acm;
mod azure_keyvault;
mod cert_folder;
mod domain;
mod k8s_secrets;
mod keystore;
mod macos_keychain;
mod nginx;
mod pki_bundle;
mod postgres_tls;
mod system_trust;
mod windows_certstore;

pub use aws_acm::AwsAcmCollector;
pub use azure_keyvault::AzureKeyVaultCollector;
pub use cert_folder::CertFolderCollector;
pub use domain::DomainCollector;
pub use k8s_secrets::K8sSecretsCollector;
pub use keystore::KeystoreCollector;
pub use macos_keychain::MacosKeychainCollector;
pub use nginx::NginxCollector;
pub use pki_bundle::PkiBundleCollector;
pub use postgres_tls::PostgresTlsCollector;
pub use system_trust::SystemTrustCollector;
pub use windows_certstore::WindowsCertStoreCollector;

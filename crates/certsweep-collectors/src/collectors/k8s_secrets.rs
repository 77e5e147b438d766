//! Kubernetes `kubernetes.io/tls` secrets.
//!
//! Reads the cluster endpoint and credentials from a kubeconfig, then lists
//! TLS secrets either in one namespace or in every namespace the
//! credentials can see.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use certsweep_client::HttpTransport;
use certsweep_core::decode::decode_first;
use certsweep_core::{
    CertificateRecord, Collector, CollectorConfig, DecodeError, Harvest, RecordInput, Result,
    SweepError,
};
use directories::BaseDirs;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::registry::Builtin;
use crate::support::{build_transport, finished, transport_builder};

const TLS_SECRET_SELECTOR: &str = "type=kubernetes.io/tls";
const TLS_CERT_KEY: &str = "tls.crt";

/// Inventories TLS secrets through the Kubernetes API
#[derive(Debug, Default)]
pub struct K8sSecretsCollector;

impl Builtin for K8sSecretsCollector {
    const NAME: &'static str = "k8s-secrets";
    const DESCRIPTION: &'static str = "Extract certificates from Kubernetes TLS secrets";
}

/// The subset of a kubeconfig needed to reach one cluster
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct KubeConfig {
    current_context: Option<String>,
    #[serde(default)]
    contexts: Vec<Named<ContextEntry>>,
    #[serde(default)]
    clusters: Vec<Named<ClusterEntry>>,
    #[serde(default)]
    users: Vec<Named<UserEntry>>,
}

#[derive(Debug, Deserialize)]
struct Named<T> {
    name: String,
    #[serde(alias = "context", alias = "cluster", alias = "user")]
    item: T,
}

#[derive(Debug, Deserialize)]
struct ContextEntry {
    cluster: String,
    user: Option<String>,
    namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ClusterEntry {
    server: String,
    certificate_authority_data: Option<String>,
    certificate_authority: Option<PathBuf>,
    #[serde(default)]
    insecure_skip_tls_verify: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct UserEntry {
    token: Option<String>,
    client_certificate_data: Option<String>,
    client_key_data: Option<String>,
    client_certificate: Option<PathBuf>,
    client_key: Option<PathBuf>,
}

/// Resolved connection settings for one cluster
#[derive(Debug, Default)]
pub struct ClusterAccess {
    /// API server base URL
    pub server: String,
    /// Bearer token
    pub token: Option<String>,
    /// Extra trust anchor (PEM)
    pub ca_pem: Option<Vec<u8>>,
    /// Client certificate and key (PEM)
    pub identity_pem: Option<Vec<u8>>,
    /// Skip server verification
    pub insecure: bool,
    /// Namespace of the selected context
    pub namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectItem>,
}

#[derive(Debug, Deserialize)]
struct ObjectItem {
    metadata: Metadata,
    #[serde(default)]
    data: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    name: String,
}

fn kube_error(context: &str, cause: impl Into<certsweep_core::BoxError>) -> SweepError {
    SweepError::source(K8sSecretsCollector::NAME, context, cause)
}

fn pem_material(data: Option<&str>, file: Option<&Path>, base: &Path) -> Result<Option<Vec<u8>>> {
    if let Some(encoded) = data.filter(|d| !d.is_empty()) {
        return STANDARD
            .decode(encoded.trim())
            .map(Some)
            .map_err(|e| kube_error("reading kubeconfig", format!("invalid base64 credential: {e}")));
    }
    match file {
        Some(path) => {
            let path = base.join(path);
            std::fs::read(&path)
                .map(Some)
                .map_err(|e| kube_error("reading kubeconfig", format!("{}: {e}", path.display())))
        }
        None => Ok(None),
    }
}

impl KubeConfig {
    /// Parse kubeconfig YAML
    pub fn parse(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| kube_error("parsing kubeconfig", e))
    }

    /// Connection settings for `context` (or the current context).
    ///
    /// Relative credential file paths resolve against `base`. Credential
    /// files are read with blocking I/O.
    pub fn access(&self, context: Option<&str>, base: &Path) -> Result<ClusterAccess> {
        let wanted = context
            .or(self.current_context.as_deref())
            .ok_or_else(|| kube_error("reading kubeconfig", "no context selected"))?;
        let ctx = self
            .contexts
            .iter()
            .find(|c| c.name == wanted)
            .ok_or_else(|| kube_error("reading kubeconfig", format!("context '{wanted}' not found")))?;
        let cluster = self
            .clusters
            .iter()
            .find(|c| c.name == ctx.item.cluster)
            .ok_or_else(|| {
                kube_error("reading kubeconfig", format!("cluster '{}' not found", ctx.item.cluster))
            })?;
        let anonymous = UserEntry::default();
        let user = match &ctx.item.user {
            Some(name) => self
                .users
                .iter()
                .find(|u| &u.name == name)
                .map(|u| &u.item)
                .ok_or_else(|| kube_error("reading kubeconfig", format!("user '{name}' not found")))?,
            None => &anonymous,
        };

        let ca_pem = pem_material(
            cluster.item.certificate_authority_data.as_deref(),
            cluster.item.certificate_authority.as_deref(),
            base,
        )?;
        let cert = pem_material(
            user.client_certificate_data.as_deref(),
            user.client_certificate.as_deref(),
            base,
        )?;
        let key = pem_material(user.client_key_data.as_deref(), user.client_key.as_deref(), base)?;
        let identity_pem = match (cert, key) {
            (Some(mut cert), Some(key)) => {
                cert.push(b'\n');
                cert.extend(key);
                Some(cert)
            }
            _ => None,
        };

        Ok(ClusterAccess {
            server: cluster.item.server.trim_end_matches('/').to_string(),
            token: user.token.clone().filter(|t| !t.is_empty()),
            ca_pem,
            identity_pem,
            insecure: cluster.item.insecure_skip_tls_verify,
            namespace: ctx.item.namespace.clone(),
        })
    }
}

/// Kubeconfig location: `kubeconfig` option, then `$KUBECONFIG`, then `~/.kube/config`
pub fn kubeconfig_path(config: &CollectorConfig) -> Option<PathBuf> {
    if let Some(explicit) = config.str("kubeconfig") {
        return Some(PathBuf::from(explicit));
    }
    if let Some(first) = std::env::var_os("KUBECONFIG")
        .as_deref()
        .and_then(|v| std::env::split_paths(v).find(|p| !p.as_os_str().is_empty()))
    {
        return Some(first);
    }
    BaseDirs::new().map(|dirs| dirs.home_dir().join(".kube").join("config"))
}

struct KubeClient {
    http: HttpTransport,
    access: ClusterAccess,
}

impl KubeClient {
    fn connect(access: ClusterAccess, config: &CollectorConfig) -> Result<Self> {
        let mut builder = transport_builder(K8sSecretsCollector::NAME, config)?
            .accept_invalid_certs(access.insecure || config.bool("insecure").unwrap_or(false));
        if let Some(ca) = &access.ca_pem {
            builder = builder.root_certificate_pem(ca.clone());
        }
        if let Some(identity) = &access.identity_pem {
            builder = builder.identity_pem(identity.clone());
        }
        Ok(Self {
            http: build_transport(K8sSecretsCollector::NAME, builder)?,
            access,
        })
    }

    async fn list(&self, path: &str) -> std::result::Result<ObjectList, certsweep_core::TransportError> {
        let url = format!("{}{path}", self.access.server);
        let mut request = self.http.get(&url).header("Accept", "application/json");
        if let Some(token) = &self.access.token {
            request = request.bearer_auth(token);
        }
        self.http.json(request).await
    }

    async fn namespaces(&self, config: &CollectorConfig) -> Result<Vec<String>> {
        if let Some(ns) = config.str("namespace").or(self.access.namespace.as_deref()) {
            return Ok(vec![ns.to_string()]);
        }
        let list = self
            .list("/api/v1/namespaces")
            .await
            .map_err(|e| kube_error("listing namespaces", e))?;
        Ok(list.items.into_iter().map(|item| item.metadata.name).collect())
    }

    async fn tls_secrets(&self, namespace: &str) -> Result<Vec<ObjectItem>> {
        let path = format!("/api/v1/namespaces/{namespace}/secrets?fieldSelector={TLS_SECRET_SELECTOR}");
        Ok(self.list(&path).await?.items)
    }
}

/// Record for a TLS secret, or `None` when it carries no `tls.crt`
fn record_from_secret(
    secret: &ObjectItem,
    namespace: &str,
    config: &CollectorConfig,
) -> Option<Result<CertificateRecord>> {
    let encoded = secret.data.get(TLS_CERT_KEY)?;
    Some(decode_secret(encoded, &secret.metadata.name, namespace, config))
}

fn decode_secret(
    encoded: &str,
    name: &str,
    namespace: &str,
    config: &CollectorConfig,
) -> Result<CertificateRecord> {
    let raw = STANDARD
        .decode(encoded.trim())
        .map_err(|e| DecodeError::Pem(format!("{TLS_CERT_KEY}: {e}")))?;
    let cert = decode_first(&raw)?;
    Ok(RecordInput::from_decoded(&cert)
        .fallback(name)
        .tag("k8s_secret", name)
        .tag("k8s_namespace", namespace)
        .classify(config)
        .finish(K8sSecretsCollector::NAME))
}

#[async_trait]
impl Collector for K8sSecretsCollector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    async fn collect(&self, config: &CollectorConfig) -> Result<Harvest> {
        self.validate(config)?;

        let path = kubeconfig_path(config)
            .ok_or_else(|| kube_error("locating kubeconfig", "no home directory"))?;
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| kube_error("reading kubeconfig", format!("{}: {e}", path.display())))?;
        let base = path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let context = config.str("context").map(str::to_string);
        let access = tokio::task::spawn_blocking(move || -> Result<ClusterAccess> {
            KubeConfig::parse(&text)?.access(context.as_deref(), &base)
        })
        .await
        .map_err(|e| kube_error("reading kubeconfig", e))??;
        debug!(collector = Self::NAME, server = %access.server, "using cluster");

        let client = KubeClient::connect(access, config)?;
        let mut harvest = Harvest::new(Self::NAME);

        for namespace in client.namespaces(config).await? {
            let secrets = match client.tls_secrets(&namespace).await {
                Ok(secrets) => secrets,
                Err(e) => {
                    harvest.skip(format!("namespace/{namespace}"), e);
                    continue;
                }
            };

            for secret in &secrets {
                let item = format!("{namespace}/{}", secret.metadata.name);
                match record_from_secret(secret, &namespace, config) {
                    Some(result) => harvest.absorb(item, result),
                    None => debug!(collector = Self::NAME, secret = %item, "secret has no tls.crt"),
                }
            }
        }

        Ok(finished(harvest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KUBECONFIG: &str = r"
apiVersion: v1
kind: Config
current-context: dev
contexts:
  - name: dev
    context:
      cluster: dev-cluster
      user: dev-user
  - name: prod
    context:
      cluster: prod-cluster
      user: prod-user
      namespace: web
clusters:
  - name: dev-cluster
    cluster:
      server: https://dev.k8s.internal:6443/
      insecure-skip-tls-verify: true
  - name: prod-cluster
    cluster:
      server: https://prod.k8s.internal
users:
  - name: dev-user
    user:
      token: dev-token
  - name: prod-user
    user:
      token: prod-token
";

    #[test]
    fn current_context_is_default() {
        let access = KubeConfig::parse(KUBECONFIG).unwrap().access(None, Path::new(".")).unwrap();
        assert_eq!(access.server, "https://dev.k8s.internal:6443");
        assert_eq!(access.token.as_deref(), Some("dev-token"));
        assert!(access.insecure);
        assert!(access.namespace.is_none());
    }

    #[test]
    fn explicit_context_wins() {
        let access = KubeConfig::parse(KUBECONFIG)
            .unwrap()
            .access(Some("prod"), Path::new("."))
            .unwrap();
        assert_eq!(access.server, "https://prod.k8s.internal");
        assert_eq!(access.namespace.as_deref(), Some("web"));
        assert!(!access.insecure);
    }

    #[test]
    fn unknown_context_is_fatal() {
        let err = KubeConfig::parse(KUBECONFIG)
            .unwrap()
            .access(Some("staging"), Path::new("."))
            .unwrap_err();
        assert!(matches!(err, SweepError::Source { .. }));
    }

    #[test]
    fn secrets_without_certificate_are_ignored() {
        let secret: ObjectItem =
            serde_json::from_value(serde_json::json!({ "metadata": { "name": "opaque" } })).unwrap();
        assert!(record_from_secret(&secret, "default", &CollectorConfig::new()).is_none());
    }

    #[test]
    fn explicit_kubeconfig_option() {
        let cfg = CollectorConfig::new().with("kubeconfig", "/etc/kube/admin.conf");
        assert_eq!(kubeconfig_path(&cfg), Some(PathBuf::from("/etc/kube/admin.conf")));
    }
}

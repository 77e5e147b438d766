//! API-backed collectors against mock servers.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use certsweep_collectors::{AwsAcmCollector, AzureKeyVaultCollector, K8sSecretsCollector};
use certsweep_core::{Collector, CollectorConfig, SweepError};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LEAF_PEM: &str = include_str!("../../certsweep-core/tests/fixtures/leaf.pem");
const CA_PEM: &str = include_str!("../../certsweep-core/tests/fixtures/ca.pem");
const LEAF_DER: &[u8] = include_bytes!("../../certsweep-core/tests/fixtures/leaf.der");

const LIST_TARGET: &str = "CertificateManager.ListCertificates";
const DESCRIBE_TARGET: &str = "CertificateManager.DescribeCertificate";

fn acm_config(server: &MockServer) -> CollectorConfig {
    CollectorConfig::new()
        .with("access_key_id", "AKIDEXAMPLE")
        .with("secret_access_key", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY")
        .with("region", "eu-west-1")
        .with("endpoint", server.uri())
        .with("proxy", false)
}

fn arn(id: &str) -> String {
    format!("arn:aws:acm:eu-west-1:123456789012:certificate/{id}")
}

#[tokio::test]
async fn acm_pages_and_isolates_describe_failures() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("x-amz-target", LIST_TARGET))
        .and(header("content-type", "application/x-amz-json-1.1"))
        .and(header_exists("authorization"))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "CertificateSummaryList": [{ "CertificateArn": arn("one"), "DomainName": "one.example" }],
            "NextToken": "page-2"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("x-amz-target", LIST_TARGET))
        .and(body_json(json!({ "NextToken": "page-2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "CertificateSummaryList": [{ "CertificateArn": arn("two") }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(header("x-amz-target", DESCRIBE_TARGET))
        .and(body_json(json!({ "CertificateArn": arn("one") })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Certificate": {
                "CertificateArn": arn("one"),
                "DomainName": "one.example",
                "SubjectAlternativeNames": ["one.example", "www.one.example"],
                "NotBefore": 1_704_067_200.0,
                "NotAfter": 1_735_689_600.0,
                "Status": "ISSUED"
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("x-amz-target", DESCRIBE_TARGET))
        .and(body_json(json!({ "CertificateArn": arn("two") })))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "internal" })))
        .mount(&server)
        .await;

    let harvest = AwsAcmCollector.collect(&acm_config(&server)).await.unwrap();

    assert_eq!(harvest.len(), 1);
    let record = &harvest.records()[0];
    assert_eq!(record.domain, "one.example");
    assert_eq!(record.issuer, "Amazon");
    assert_eq!(record.tags["aws_arn"], arn("one").as_str());
    assert_eq!(record.tags["aws_status"], "ISSUED");

    assert_eq!(harvest.skipped().len(), 1);
    assert_eq!(harvest.skipped()[0].item, arn("two"));
}

#[tokio::test]
async fn acm_rejected_credentials_fail_the_source() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "__type": "UnrecognizedClientException",
            "message": "The security token included in the request is invalid."
        })))
        .mount(&server)
        .await;

    let err = AwsAcmCollector.collect(&acm_config(&server)).await.unwrap_err();
    assert!(matches!(err, SweepError::Source { ref collector, .. } if collector == "aws-acm"));
    assert!(err.is_auth_error());
}

#[tokio::test]
async fn acm_requires_credentials() {
    let err = AwsAcmCollector
        .collect(&CollectorConfig::new().with("access_key_id", "AKID"))
        .await
        .unwrap_err();
    assert!(
        matches!(err, SweepError::Configuration { ref parameter, .. } if parameter == "secret_access_key")
    );
}

async fn mount_azure_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "access_token": "vault-token"
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn azure_config(server: &MockServer) -> CollectorConfig {
    CollectorConfig::new()
        .with("vault_name", "corp")
        .with("client_id", "client-1")
        .with("client_secret", "s3cret")
        .with("tenant_id", "tenant-1")
        .with("authority_host", server.uri())
        .with("vault_url", server.uri())
        .with("proxy", false)
}

#[tokio::test]
async fn azure_lists_pages_and_reuses_tokens() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_azure_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/certificates"))
        .and(query_param("api-version", "7.4"))
        .and(header("authorization", "Bearer vault-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{ "id": format!("{base}/certificates/web") }],
            "nextLink": format!("{base}/certificates?api-version=7.4&$skiptoken=2")
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/certificates"))
        .and(query_param("$skiptoken", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                { "id": format!("{base}/certificates/api") },
                { "id": format!("{base}/certificates/broken") }
            ],
            "nextLink": null
        })))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/certificates/web"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": format!("{base}/certificates/web/v1"),
            "cer": STANDARD.encode(LEAF_DER),
            "attributes": { "enabled": true }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/certificates/api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": format!("{base}/certificates/api/v3"),
            "attributes": { "enabled": false, "nbf": 1_704_067_200, "exp": 1_735_689_600 },
            "policy": {
                "x509_props": { "subject": "CN=api.corp.example", "sans": { "dns_names": ["api.corp.example"] } },
                "issuer": { "name": "Self" }
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/certificates/broken"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": "CertificateNotFound", "message": "gone" }
        })))
        .mount(&server)
        .await;

    let collector = AzureKeyVaultCollector::default();
    let config = azure_config(&server);
    let harvest = collector.collect(&config).await.unwrap();

    assert_eq!(harvest.len(), 2);
    assert_eq!(harvest.skipped().len(), 1);
    assert!(harvest.skipped()[0].item.ends_with("/certificates/broken"));

    let web = &harvest.records()[0];
    assert_eq!(web.domain, "www.example.com");
    assert_eq!(web.issuer, "Example Test CA");
    assert_eq!(web.tags["azure_vault"], "corp");

    let api = &harvest.records()[1];
    assert_eq!(api.domain, "api.corp.example");
    assert_eq!(api.issuer, "Self");
    assert_eq!(api.tags["azure_enabled"], false);

    let again = collector.collect(&config).await.unwrap();
    assert_eq!(again.len(), 2);
}

#[tokio::test]
async fn azure_token_failure_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "AADSTS7000215: Invalid client secret provided."
        })))
        .mount(&server)
        .await;

    let err = AzureKeyVaultCollector::default()
        .collect(&azure_config(&server))
        .await
        .unwrap_err();
    assert!(matches!(err, SweepError::Source { .. }));
    assert!(err.is_auth_error());
}

fn write_kubeconfig(dir: &TempDir, server: &MockServer, namespace: Option<&str>) -> String {
    let namespace = namespace.map_or_else(String::new, |ns| format!("\n      namespace: {ns}"));
    let text = format!(
        "apiVersion: v1
kind: Config
current-context: test
contexts:
  - name: test
    context:
      cluster: mock
      user: robot{namespace}
clusters:
  - name: mock
    cluster:
      server: {}
users:
  - name: robot
    user:
      token: k8s-token
",
        server.uri()
    );
    let path = dir.path().join("kubeconfig");
    std::fs::write(&path, text).unwrap();
    path.display().to_string()
}

#[tokio::test]
async fn k8s_walks_namespaces_and_isolates_failures() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let kubeconfig = write_kubeconfig(&dir, &server, None);

    Mock::given(method("GET"))
        .and(path("/api/v1/namespaces"))
        .and(header("authorization", "Bearer k8s-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "metadata": { "name": "default" } }, { "metadata": { "name": "locked" } }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/namespaces/default/secrets"))
        .and(query_param("fieldSelector", "type=kubernetes.io/tls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                { "metadata": { "name": "site-tls" }, "data": { "tls.crt": STANDARD.encode(LEAF_PEM), "tls.key": "a2V5" } },
                { "metadata": { "name": "no-cert" }, "data": {} },
                { "metadata": { "name": "broken-tls" }, "data": { "tls.crt": STANDARD.encode("garbage") } }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/namespaces/locked/secrets"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "kind": "Status", "message": "secrets is forbidden"
        })))
        .mount(&server)
        .await;

    let config = CollectorConfig::new()
        .with("kubeconfig", kubeconfig)
        .with("proxy", false);
    let harvest = K8sSecretsCollector.collect(&config).await.unwrap();

    assert_eq!(harvest.len(), 1);
    let record = &harvest.records()[0];
    assert_eq!(record.domain, "www.example.com");
    assert_eq!(record.tags["k8s_secret"], "site-tls");
    assert_eq!(record.tags["k8s_namespace"], "default");

    let mut skipped: Vec<_> = harvest.skipped().iter().map(|s| s.item.as_str()).collect();
    skipped.sort_unstable();
    assert_eq!(skipped, vec!["default/broken-tls", "namespace/locked"]);
}

#[tokio::test]
async fn k8s_context_namespace_limits_the_walk() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let kubeconfig = write_kubeconfig(&dir, &server, Some("web"));

    Mock::given(method("GET"))
        .and(path("/api/v1/namespaces"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/namespaces/web/secrets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let config = CollectorConfig::new()
        .with("kubeconfig", kubeconfig)
        .with("proxy", false);
    let harvest = K8sSecretsCollector.collect(&config).await.unwrap();
    assert!(harvest.is_empty());
}

#[tokio::test]
async fn k8s_reads_credential_files_next_to_the_kubeconfig() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let kubeconfig = write_kubeconfig(&dir, &server, Some("web"));
    let text = std::fs::read_to_string(&kubeconfig).unwrap().replace(
        "      server: ",
        "      certificate-authority: ca.pem\n      server: ",
    );
    std::fs::write(&kubeconfig, text).unwrap();

    Mock::given(method("GET"))
        .and(path("/api/v1/namespaces/web/secrets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .mount(&server)
        .await;

    let config = CollectorConfig::new()
        .with("kubeconfig", kubeconfig.clone())
        .with("proxy", false);

    let err = K8sSecretsCollector.collect(&config).await.unwrap_err();
    assert!(err.to_string().contains("ca.pem"), "unexpected error: {err}");

    std::fs::write(dir.path().join("ca.pem"), CA_PEM).unwrap();
    let harvest = K8sSecretsCollector.collect(&config).await.unwrap();
    assert!(harvest.is_empty());
    assert!(harvest.skipped().is_empty());
}

#[tokio::test]
async fn k8s_missing_kubeconfig_is_fatal() {
    let config = CollectorConfig::new().with("kubeconfig", "/nonexistent/kubeconfig");
    let err = K8sSecretsCollector.collect(&config).await.unwrap_err();
    assert!(matches!(err, SweepError::Source { ref collector, .. } if collector == "k8s-secrets"));
}

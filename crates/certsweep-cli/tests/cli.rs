//! End-to-end runs of the `certsweep` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const LEAF_PEM: &str = include_str!("../../certsweep-core/tests/fixtures/leaf.pem");

fn certsweep() -> Command {
    let mut cmd = Command::cargo_bin("certsweep").unwrap();
    cmd.env_remove("RUST_LOG").env_remove("CERTSWEEP_INVENTORY");
    cmd
}

fn cert_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("site.pem"), LEAF_PEM).unwrap();
    dir
}

#[test]
fn list_shows_every_collector() {
    certsweep()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("cert-folder"))
        .stdout(predicate::str::contains("windows-certstore"))
        .stdout(predicate::str::contains("vault_name, client_id"));
}

#[test]
fn list_as_json() {
    let output = certsweep().args(["--format", "json", "list"]).output().unwrap();
    assert!(output.status.success());
    let list: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(list.as_array().unwrap().len(), 12);
    assert_eq!(list[0]["name"], "aws-acm");
}

#[test]
fn collect_prints_records_as_json() {
    let dir = cert_dir();
    let output = certsweep()
        .args(["--format", "json", "collect", "cert-folder", "--set"])
        .arg(format!("folders={}", dir.path().display()))
        .args(["--environment", "prod"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let records: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(records[0]["domain"], "www.example.com");
    assert_eq!(records[0]["tags"]["environment"], "prod");
    assert_eq!(records[0]["tags"]["file_name"], "site.pem");
}

#[test]
fn collect_table_includes_summary() {
    let dir = cert_dir();
    certsweep()
        .args(["--no-color", "collect", "cert-folder", "--set"])
        .arg(format!("folders={}", dir.path().display()))
        .assert()
        .success()
        .stdout(predicate::str::contains("www.example.com"))
        .stdout(predicate::str::contains("1 certificates"));
}

#[test]
fn collect_reports_missing_options() {
    certsweep()
        .args(["collect", "cert-folder"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required parameter 'folders' missing"));
}

#[test]
fn collect_reports_unknown_collectors() {
    certsweep()
        .args(["collect", "ftp-server"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("collector 'ftp-server' not found"));
}

#[test]
fn run_keeps_going_past_a_failed_collector() {
    let dir = cert_dir();
    let inventory = dir.path().join("inventory.toml");
    fs::write(
        &inventory,
        format!(
            r#"
[defaults]
group = "edge"

[[collectors]]
name = "cert-folder"
[collectors.config]
folders = ["{}"]

[[collectors]]
name = "nginx"
label = "broken-nginx"
[collectors.config]
config_path = "/nonexistent/nginx"
"#,
            dir.path().display()
        ),
    )
    .unwrap();

    let output = certsweep()
        .args(["--format", "json", "run", "--inventory"])
        .arg(&inventory)
        .output()
        .unwrap();

    assert!(!output.status.success());
    let records: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(records.as_array().unwrap().len(), 1);
    assert_eq!(records[0]["tags"]["group"], "edge");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ok cert-folder: 1 records, 0 skipped"), "{stderr}");
    assert!(stderr.contains("failed broken-nginx: nginx:"), "{stderr}");
}

#[test]
fn run_without_inventory_fails_cleanly() {
    certsweep()
        .args(["run", "--inventory", "/nonexistent/inventory.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not read inventory"));
}

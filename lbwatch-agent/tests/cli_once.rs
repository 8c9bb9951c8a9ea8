//! `lbwatch once` run as a child process against the mock API

#![cfg(target_os = "linux")]

use std::path::Path;
use std::process::Output;

use lbwatch_agent::credentials::{CredentialStore, Credentials, FileStore};
use lbwatch_devkit::{origin, pool, pools_page, MockPage, MockPoolsApi};
use tokio::process::Command;

/// Isolated config home with stored credentials and a config pointing at `api`
fn prepare(home: &Path, api: &MockPoolsApi) -> std::path::PathBuf {
    let config_home = home.join("config");
    FileStore::new(config_home.join("lbwatch").join("credentials.toml"))
        .set(&Credentials::new("test-token", "0123456789abcdef").unwrap())
        .unwrap();

    let config_path = home.join("lbwatch.toml");
    std::fs::write(
        &config_path,
        format!("[api]\nbase_url = \"{}\"\nrequest_timeout_secs = 5\n", api.base_url()),
    )
    .unwrap();
    config_path
}

async fn run_once(home: &Path, config: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_lbwatch"))
        .arg("--config")
        .arg(config)
        .arg("once")
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("RUST_LOG", "off")
        .output()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_once_prints_table() {
    let api = MockPoolsApi::start(vec![MockPage::ok(pools_page(
        vec![pool("p1", "primary", vec![origin("app-1", "10.0.0.1", Some(true))])],
        1,
        50,
        Some(1),
    ))])
    .await
    .unwrap();
    let home = tempfile::tempdir().unwrap();
    let config = prepare(home.path(), &api);

    let output = run_once(home.path(), &config).await;

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("primary"));
    assert!(stdout.contains("app-1"));
}

#[tokio::test]
async fn test_once_failure_exits_with_error() {
    let api = MockPoolsApi::start(vec![MockPage::status(403, "forbidden")])
        .await
        .unwrap();
    let home = tempfile::tempdir().unwrap();
    let config = prepare(home.path(), &api);

    let output = run_once(home.path(), &config).await;

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Things to check"));
    assert!(stderr.contains("Failed to load pools"));
    assert!(stderr.contains("HTTP 403: forbidden"));
}

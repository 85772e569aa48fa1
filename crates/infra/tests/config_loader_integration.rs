//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files and
//! building a client from it.

use std::io::Write;

use lrsync_domain::Statement;
use lrsync_infra::{config, LrsClient};
use tempfile::NamedTempFile;

fn temp_config(contents: &str, extension: &str) -> std::path::PathBuf {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file.write_all(contents.as_bytes()).expect("Failed to write to temp file");
    let path = temp_file.path().with_extension(extension);
    std::fs::copy(temp_file.path(), &path).expect("Failed to copy file");
    path
}

#[test]
fn test_load_config_from_json_file() {
    let path = temp_config(
        r#"{
            "endpoint": "https://lrs.example.com/xapi/",
            "flush_interval_secs": 60,
            "batch_size": 20,
            "request_timeout_secs": 15,
            "server_errors_are_failures": true,
            "nice_error_messages": true,
            "api_version": "1.0.3"
        }"#,
        "json",
    );

    let config = config::load_from_file(Some(path.clone())).expect("Failed to load config from JSON file");

    assert_eq!(config.endpoint, "https://lrs.example.com/xapi/");
    assert_eq!(config.flush_interval_secs, 60);
    assert_eq!(config.batch_size, 20);
    assert_eq!(config.request_timeout_secs, 15);
    assert!(config.nice_error_messages);
    assert_eq!(config.api_version, "1.0.3");
    assert!(config.queue_path.is_none());

    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_from_toml_file() {
    let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let queue_path = dir.path().join("queue.json");
    let path = temp_config(
        &format!(
            "endpoint = \"https://lrs.example.com/\"\nflush_interval_secs = 0\nqueue_path = {:?}\n",
            queue_path.display().to_string()
        ),
        "toml",
    );

    let config = config::load_from_file(Some(path.clone())).expect("Failed to load config from TOML file");
    assert_eq!(config.flush_interval_secs, 0);
    assert_eq!(config.queue_path.as_deref(), Some(queue_path.as_path()));

    std::fs::remove_file(path).ok();
}

#[tokio::test]
async fn test_loaded_config_builds_file_backed_client() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let queue_path = dir.path().join("queue.json");
    let path = temp_config(
        &format!(
            r#"{{ "endpoint": "http://127.0.0.1:9/", "flush_interval_secs": 0, "queue_path": {} }}"#,
            serde_json::to_string(&queue_path)?
        ),
        "json",
    );

    let config = config::load_from_file(Some(path.clone()))?;
    let client = LrsClient::builder(config).build()?;
    let statement = Statement::from_value(serde_json::json!({ "id": "file-backed" }))?;
    client.store_statements(vec![statement], false).await?;

    assert!(queue_path.exists(), "queue file is written on enqueue");
    std::fs::remove_file(path).ok();
    Ok(())
}

#[test]
fn test_invalid_endpoint_is_rejected() {
    let path = temp_config(r#"{ "endpoint": "not a url" }"#, "json");

    let result = config::load_from_file(Some(path.clone()));
    assert!(result.is_err(), "Invalid endpoint must fail validation");

    std::fs::remove_file(path).ok();
}

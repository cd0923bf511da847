//! Configuration file integration tests.

use athena_relay::engine::MockQueryEngine;
use athena_relay::store::MemoryObjectStore;
use athena_relay::{QueryRelay, RelayConfig, RelayError};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_from_file() {
    let file = write_config(
        r#"
database = "analytics"
output_location = "s3://query-results/relay/"
page_size = 250
utc_dates = true

[engine]
endpoint = "http://localhost:4566"
authorization = "Bearer local"
"#,
    );

    let config = RelayConfig::load_from_file(file.path()).unwrap();

    assert_eq!(config.database, "analytics");
    assert_eq!(config.workgroup, "primary");
    assert_eq!(config.page_size, Some(250));
    assert!(config.utc_dates);
    assert_eq!(config.engine.endpoint.as_deref(), Some("http://localhost:4566"));
    assert!(config.validate().is_ok());
    assert!(config.engine_client().is_ok());
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = RelayConfig::load_from_file(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, RelayConfig::default());
}

#[test]
fn test_malformed_file_names_path() {
    let file = write_config("page_size = \"many\"\n");

    let err = RelayConfig::load_from_file(file.path()).unwrap_err();

    assert!(matches!(err, RelayError::Configuration(_)));
    assert!(err
        .to_string()
        .contains(&file.path().display().to_string()));
}

#[test]
fn test_invalid_file_rejected_before_any_call() {
    let file = write_config("output_location = \"/tmp/results\"\n");
    let config = RelayConfig::load_from_file(file.path()).unwrap();
    let engine = Arc::new(MockQueryEngine::new());

    let result = QueryRelay::new(engine.clone(), Arc::new(MemoryObjectStore::new()), config);

    assert!(matches!(result, Err(RelayError::Configuration(_))));
    assert_eq!(engine.start_calls(), 0);
}

#[test]
fn test_default_path() {
    let path = RelayConfig::default_path();
    assert!(path.ends_with("athena-relay/config.toml"));
}

use super::settings::Settings;
use super::{Backend, load_config_from, validate};

use serial_test::serial;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.broker.backend, Backend::WebSocket);
    assert_eq!(settings.broker.brokers, "ws://127.0.0.1:8080");
    assert_eq!(settings.topic.name, "orders");
    assert_eq!(settings.topic.partitions, 1);
    assert_eq!(settings.publisher.max_retries, 3);
    assert_eq!(settings.publisher.progress_interval, 100);
    assert_eq!(settings.publisher.retry_backoff_ms, 0);
    assert!(settings.publisher.dead_letter_path.is_none());
    assert!(
        settings.publisher.interrupt_flush_timeout_ms < settings.publisher.flush_timeout_ms
    );
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("linepub.toml");
    let toml = r#"
        [broker]
        backend = "kafka"
        brokers = "localhost:9092"

        [topic]
        name = "client_support"
        partitions = 3

        [publisher]
        max_retries = 7
        dead_letter_path = "/var/lib/linepub/dead"
    "#;
    fs::write(&path, toml).expect("write config file");

    let cfg = temp_env::with_vars_unset(
        ["LINEPUB_PUBLISHER__MAX_RETRIES", "LINEPUB_TOPIC__NAME"],
        || load_config_from(Some(path.as_path())),
    )
    .expect("load_config failed");

    assert_eq!(cfg.broker.backend, Backend::Kafka);
    assert_eq!(cfg.broker.brokers, "localhost:9092");
    assert_eq!(cfg.topic.name, "client_support");
    assert_eq!(cfg.topic.partitions, 3);
    // untouched values keep their defaults
    assert_eq!(cfg.topic.replication_factor, 1);
    assert_eq!(cfg.publisher.max_retries, 7);
    assert_eq!(cfg.publisher.flush_timeout_ms, 30_000);
    assert_eq!(
        cfg.publisher.dead_letter_path.as_deref(),
        Some("/var/lib/linepub/dead")
    );
}

#[test]
#[serial]
fn environment_overrides_file_values() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("linepub.toml");
    fs::write(&path, "[publisher]\nmax_retries = 7\n").expect("write config file");

    let cfg = temp_env::with_vars(
        [
            ("LINEPUB_PUBLISHER__MAX_RETRIES", Some("0")),
            ("LINEPUB_TOPIC__NAME", Some("orders_eu")),
        ],
        || load_config_from(Some(path.as_path())),
    )
    .expect("load_config failed");

    assert_eq!(cfg.publisher.max_retries, 0);
    assert_eq!(cfg.topic.name, "orders_eu");
}

#[test]
#[serial]
fn missing_explicit_file_is_an_error() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("absent.toml");
    assert!(load_config_from(Some(path.as_path())).is_err());
}

#[test]
fn validate_rejects_unusable_values() {
    let mut settings = Settings::default();
    assert!(validate(&settings).is_ok());

    settings.topic.name = "  ".to_string();
    assert!(validate(&settings).is_err());

    let mut settings = Settings::default();
    settings.topic.partitions = 0;
    assert!(validate(&settings).is_err());

    let mut settings = Settings::default();
    settings.broker.queue_capacity = 0;
    assert!(validate(&settings).is_err());
}

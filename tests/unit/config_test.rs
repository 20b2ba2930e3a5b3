//! Tests for configuration validation and loading

use std::collections::HashMap;
use std::time::Duration;

use offline_dispatch::config::EngineConfig;

fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |name| map.get(name).cloned()
}

#[test]
fn test_defaults() {
    let cfg = EngineConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.dispatch_timeout(), Duration::from_secs(30));
    assert_eq!(cfg.probe_cooldown(), Duration::from_secs(10));
    assert_eq!(cfg.probe_connect_timeout(), Duration::from_secs(3));
    assert_eq!(cfg.probe_read_timeout(), Duration::from_secs(10));
    assert_eq!(
        cfg.backoff_ladder_ms,
        vec![5_000, 5_000, 10_000, 15_000, 25_000, 40_000, 75_000, 105_000, 170_000]
    );
    assert!(cfg.initially_online);
    assert_eq!(cfg.worker_thread_name, "offline-dispatch");
    assert!(cfg.base_endpoint.is_none());
}

#[test]
fn test_invalid_timeout() {
    let cfg = EngineConfig {
        dispatch_timeout_ms: 0,
        ..EngineConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_invalid_cooldown() {
    let cfg = EngineConfig {
        probe_cooldown_ms: 0,
        ..EngineConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_invalid_ladders() {
    let empty = EngineConfig {
        backoff_ladder_ms: vec![],
        ..EngineConfig::default()
    };
    assert!(empty.validate().is_err());

    let descending = EngineConfig {
        backoff_ladder_ms: vec![100, 50],
        ..EngineConfig::default()
    };
    assert!(descending.validate().is_err());

    let flat = EngineConfig {
        backoff_ladder_ms: vec![50, 50, 100],
        ..EngineConfig::default()
    };
    assert!(flat.validate().is_ok());
}

#[test]
fn test_blank_endpoint_rejected() {
    let cfg = EngineConfig {
        base_endpoint: Some("   ".to_string()),
        ..EngineConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_endpoint_normalized() {
    let cfg = EngineConfig {
        base_endpoint: Some("http://example.com/api".to_string()),
        ..EngineConfig::default()
    };
    assert_eq!(
        cfg.normalized_endpoint().as_deref(),
        Some("http://example.com/api/")
    );
}

#[test]
fn test_from_json_str_partial() {
    let json = r#"{
        "base_endpoint": "http://example.com/",
        "dispatch_timeout_ms": 1500,
        "backoff_ladder_ms": [10, 20, 40]
    }"#;
    let cfg = EngineConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.dispatch_timeout_ms, 1500);
    assert_eq!(cfg.backoff_ladder_ms, vec![10, 20, 40]);
    assert_eq!(cfg.probe_cooldown_ms, 10_000);
}

#[test]
fn test_from_json_str_rejects_invalid() {
    assert!(EngineConfig::from_json_str(r#"{"dispatch_timeout_ms": 0}"#).is_err());
    assert!(EngineConfig::from_json_str("not json").is_err());
}

#[test]
fn test_from_vars_overlay() {
    let cfg = EngineConfig::from_vars(vars(&[
        ("OFFLINE_DISPATCH_BASE_ENDPOINT", "http://device.local"),
        ("OFFLINE_DISPATCH_DISPATCH_TIMEOUT_MS", "2500"),
        ("OFFLINE_DISPATCH_BACKOFF_LADDER_MS", "10, 20,40"),
        ("OFFLINE_DISPATCH_INITIALLY_ONLINE", "false"),
        ("OFFLINE_DISPATCH_WORKER_THREAD_NAME", "uploader"),
    ]))
    .unwrap();
    assert_eq!(cfg.base_endpoint.as_deref(), Some("http://device.local"));
    assert_eq!(cfg.dispatch_timeout_ms, 2500);
    assert_eq!(cfg.backoff_ladder_ms, vec![10, 20, 40]);
    assert!(!cfg.initially_online);
    assert_eq!(cfg.worker_thread_name, "uploader");
    assert_eq!(cfg.probe_cooldown_ms, 10_000);
}

#[test]
fn test_from_vars_rejects_garbage() {
    let err = EngineConfig::from_vars(vars(&[("OFFLINE_DISPATCH_DISPATCH_TIMEOUT_MS", "soon")]))
        .unwrap_err();
    assert!(err.contains("OFFLINE_DISPATCH_DISPATCH_TIMEOUT_MS"));

    assert!(EngineConfig::from_vars(vars(&[("OFFLINE_DISPATCH_INITIALLY_ONLINE", "maybe")])).is_err());
}

//! Tests for error types

use offline_dispatch::core::EngineError;

#[test]
fn test_invalid_config_error() {
    let err = EngineError::InvalidConfig("dispatch_timeout_ms must be greater than 0".to_string());
    assert_eq!(
        format!("{}", err),
        "invalid configuration: dispatch_timeout_ms must be greater than 0"
    );
}

#[test]
fn test_destroyed_error() {
    let err = EngineError::Destroyed;
    assert_eq!(format!("{}", err), "engine destroyed");
}

#[test]
fn test_probe_error() {
    let err = EngineError::Probe("no runtime".to_string());
    assert_eq!(format!("{}", err), "probe initialization failed: no runtime");
}

#[test]
fn test_internal_error() {
    let err = EngineError::Internal("worker gone".to_string());
    assert_eq!(format!("{}", err), "internal error: worker gone");
}

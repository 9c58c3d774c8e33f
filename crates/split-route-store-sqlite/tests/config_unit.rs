// crates/split-route-store-sqlite/tests/config_unit.rs
// ============================================================================
// Module: Router Configuration Unit Tests
// Description: Validation and deserialization tests for router settings.
// Purpose: Validate rejection of unusable configurations and serde defaults.
// ============================================================================

//! ## Overview
//! Unit-level tests for the configuration surface:
//! - Validation rejections (zero expected version, empty table, bad paths)
//! - Serde field defaults for busy timeout and reputation table

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::path::PathBuf;

use split_route_store_sqlite::ConfigError;
use split_route_store_sqlite::EndpointConfig;
use split_route_store_sqlite::RouterConfig;
use split_route_store_sqlite::validate_router_config;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn sample_config() -> RouterConfig {
    RouterConfig {
        primary: EndpointConfig {
            path: PathBuf::from("primary.db"),
            busy_timeout_ms: 1_000,
        },
        replica: EndpointConfig {
            path: PathBuf::from("replica.db"),
            busy_timeout_ms: 1_000,
        },
        expected_schema_version: 3,
        reputation_table: "reputation".to_string(),
    }
}

// ============================================================================
// SECTION: Validation
// ============================================================================

#[test]
fn valid_configuration_passes() {
    assert!(validate_router_config(&sample_config()).is_ok());
}

#[test]
fn zero_expected_version_is_rejected() {
    let mut config = sample_config();
    config.expected_schema_version = 0;
    let Err(err) = validate_router_config(&config) else {
        panic!("expected zero version to fail validation");
    };
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn empty_reputation_table_is_rejected() {
    let mut config = sample_config();
    config.reputation_table = "  ".to_string();
    assert!(validate_router_config(&config).is_err());
}

#[test]
fn empty_endpoint_path_is_rejected() {
    let mut config = sample_config();
    config.replica.path = PathBuf::new();
    assert!(validate_router_config(&config).is_err());
}

#[test]
fn directory_endpoint_path_is_rejected() {
    let temp = TempDir::new().expect("temp dir");
    let mut config = sample_config();
    config.primary.path = temp.path().to_path_buf();
    assert!(validate_router_config(&config).is_err());
}

// ============================================================================
// SECTION: Deserialization
// ============================================================================

#[test]
fn serde_defaults_are_applied() {
    let config: RouterConfig = serde_json::from_str(
        r#"{
            "primary": { "path": "primary.db" },
            "replica": { "path": "replica.db" },
            "expected_schema_version": 3
        }"#,
    )
    .expect("deserialize config");
    assert_eq!(config.primary.busy_timeout_ms, 5_000);
    assert_eq!(config.replica.busy_timeout_ms, 5_000);
    assert_eq!(config.reputation_table, "reputation");
    assert!(validate_router_config(&config).is_ok());
}

#[test]
fn serde_overrides_are_honored() {
    let config: RouterConfig = serde_json::from_str(
        r#"{
            "primary": { "path": "primary.db", "busy_timeout_ms": 250 },
            "replica": { "path": "replica.db" },
            "expected_schema_version": 4,
            "reputation_table": "custom_scores"
        }"#,
    )
    .expect("deserialize config");
    assert_eq!(config.primary.busy_timeout_ms, 250);
    assert_eq!(config.expected_schema_version, 4);
    assert_eq!(config.reputation_table, "custom_scores");
}

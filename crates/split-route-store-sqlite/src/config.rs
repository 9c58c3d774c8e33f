// crates/split-route-store-sqlite/src/config.rs
// ============================================================================
// Module: Router Configuration
// Description: Endpoint and gating settings for routed store sessions.
// Purpose: Describe the primary/replica pair, the expected schema version,
//          and the reputation table override.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Configuration for one routed session: one writable primary endpoint, one
//! read-only replica endpoint, the schema version the primary must advertise
//! before writes are permitted, and the reputation table name handed through
//! to the external reputation operations. Parsing of connection strings is a
//! host responsibility; this layer consumes already-resolved endpoint
//! settings.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default busy timeout (ms) applied to each endpoint connection.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Default table name for the reputation store.
const DEFAULT_REPUTATION_TABLE: &str = "reputation";

/// Returns the default busy timeout for endpoint connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default reputation table name.
fn default_reputation_table() -> String {
    DEFAULT_REPUTATION_TABLE.to_string()
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration validation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration value failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// Settings for one database endpoint.
///
/// # Invariants
/// - `path` must resolve to a database file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    /// Path to the endpoint's database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

/// Configuration for a routed store session.
///
/// # Invariants
/// - `expected_schema_version` must be greater than zero; 0 is the sentinel
///   for an unknown or unreadable version.
/// - `reputation_table` must be non-empty.
#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    /// Writable primary endpoint.
    pub primary: EndpointConfig,
    /// Read-only replica endpoint.
    pub replica: EndpointConfig,
    /// Schema version the primary must advertise before writes are allowed.
    pub expected_schema_version: i64,
    /// Table name handed to the external reputation operations.
    #[serde(default = "default_reputation_table")]
    pub reputation_table: String,
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates endpoint settings.
fn validate_endpoint(label: &str, endpoint: &EndpointConfig) -> Result<(), ConfigError> {
    if endpoint.path.as_os_str().is_empty() {
        return Err(ConfigError::Invalid(format!("{label} endpoint path must not be empty")));
    }
    if endpoint.path.is_dir() {
        return Err(ConfigError::Invalid(format!(
            "{label} endpoint path must be a file, not a directory"
        )));
    }
    Ok(())
}

/// Validates a complete router configuration.
///
/// # Errors
///
/// Returns [`ConfigError`] when an endpoint path is unusable, the expected
/// schema version is not positive, or the reputation table name is empty.
pub fn validate_router_config(config: &RouterConfig) -> Result<(), ConfigError> {
    validate_endpoint("primary", &config.primary)?;
    validate_endpoint("replica", &config.replica)?;
    if config.expected_schema_version < 1 {
        return Err(ConfigError::Invalid(format!(
            "expected_schema_version must be greater than zero: {}",
            config.expected_schema_version
        )));
    }
    if config.reputation_table.trim().is_empty() {
        return Err(ConfigError::Invalid("reputation_table must not be empty".to_string()));
    }
    Ok(())
}

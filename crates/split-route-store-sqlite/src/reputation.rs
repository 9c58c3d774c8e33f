// crates/split-route-store-sqlite/src/reputation.rs
// ============================================================================
// Module: Reputation Store Router
// Description: Best-effort primary routing for the reputation store.
// Purpose: Apply score mutations on the primary when it is available and
//          degrade silently when it is not.
// Dependencies: rusqlite, split-route-core, thiserror
// ============================================================================

//! ## Overview
//! The reputation store carries no version gate and no writable flag: each
//! scoring mutation checks whether the primary handle is currently usable
//! and degrades to a no-op otherwise, returning the caller's entry
//! unchanged. Whitelist scores tolerate missed updates; token counters do
//! not, and that asymmetry with the strict counter router is deliberate. Call
//! depth through this router is shallow and fixed, so the mutation resolves
//! the primary handle directly instead of engaging the swap guard.
//! Invariants:
//! - Primary unavailability is not an error; the input entry is returned
//!   unmodified and a telemetry event records the degrade.
//! - Teardown closes both handles defensively even when the primary connect
//!   failed; double-close is safe.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use rusqlite::Connection;
use split_route_core::ConnectionRole;
use split_route_core::NoopTelemetry;
use split_route_core::ReputationEntry;
use split_route_core::ReputationOps;
use split_route_core::RouterEvent;
use split_route_core::RouterTelemetry;
use thiserror::Error;

use crate::config::ConfigError;
use crate::config::RouterConfig;
use crate::config::validate_router_config;
use crate::connection::ConnectionSet;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Reputation store routing errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Primary unavailability is never represented here; it degrades silently.
#[derive(Debug, Error, Clone)]
pub enum ReputationStoreError {
    /// Underlying storage query failed on a live primary.
    #[error("reputation store db error: {0}")]
    Storage(String),
    /// Invalid router configuration.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for ReputationStoreError {
    fn from(error: ConfigError) -> Self {
        match error {
            ConfigError::Invalid(message) => Self::Invalid(message),
        }
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Best-effort router for the reputation store.
pub struct ReputationStoreRouter<O: ReputationOps<Conn = Connection>> {
    /// Session configuration.
    config: RouterConfig,
    /// External operation set the router dispatches.
    ops: O,
    /// Primary/replica handle pair.
    connections: ConnectionSet,
    /// Event sink for degrades and absorbed failures.
    telemetry: Arc<dyn RouterTelemetry>,
}

impl<O: ReputationOps<Conn = Connection>> ReputationStoreRouter<O> {
    /// Creates a router for one session; no connection is opened yet.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationStoreError::Invalid`] when the configuration
    /// fails validation.
    pub fn new(config: RouterConfig, ops: O) -> Result<Self, ReputationStoreError> {
        validate_router_config(&config)?;
        let connections = ConnectionSet::new(&config);
        Ok(Self {
            config,
            ops,
            connections,
            telemetry: Arc::new(NoopTelemetry),
        })
    }

    /// Installs a telemetry sink.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Arc<dyn RouterTelemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Returns the table name handed to the external operations.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.config.reputation_table
    }

    /// Returns true while the role's handle holds an open connection.
    #[must_use]
    pub fn is_connected(&self, role: ConnectionRole) -> bool {
        self.connections.handle(role).is_connected()
    }

    /// Applies an in-place score increment on the primary.
    ///
    /// With the primary unavailable the input entry is returned unmodified
    /// and no mutation is performed; the caller is never blocked on primary
    /// availability.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationStoreError::Storage`] when the delegated
    /// operation fails on a live primary.
    pub fn add_score(
        &mut self,
        entry: &ReputationEntry,
        delta: f64,
    ) -> Result<ReputationEntry, ReputationStoreError> {
        if !self.ensure_primary("add_score") {
            return Ok(entry.clone());
        }
        let Some(connection) = self.connections.connection(ConnectionRole::Primary) else {
            return Ok(entry.clone());
        };
        match self.ops.add_score(connection, &self.config.reputation_table, entry, delta) {
            Ok(updated) => Ok(updated),
            Err(err) => {
                self.telemetry.record(RouterEvent::StorageError {
                    operation: "add_score",
                    detail: err.to_string(),
                });
                Err(ReputationStoreError::Storage(err.to_string()))
            }
        }
    }

    /// Deletes the entry addressed by the entry's key on the primary.
    ///
    /// With the primary unavailable this is a silent no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ReputationStoreError::Storage`] when the delegated
    /// operation fails on a live primary.
    pub fn remove_entry(&mut self, entry: &ReputationEntry) -> Result<(), ReputationStoreError> {
        if !self.ensure_primary("remove_entry") {
            return Ok(());
        }
        let Some(connection) = self.connections.connection(ConnectionRole::Primary) else {
            return Ok(());
        };
        match self.ops.remove_entry(connection, &self.config.reputation_table, entry) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.telemetry.record(RouterEvent::StorageError {
                    operation: "remove_entry",
                    detail: err.to_string(),
                });
                Err(ReputationStoreError::Storage(err.to_string()))
            }
        }
    }

    /// Ends the session's use of both endpoints.
    ///
    /// Closes primary and replica defensively even when the primary connect
    /// failed; idempotent.
    pub fn teardown(&mut self) {
        self.connections.teardown();
    }

    /// Connects the primary lazily, recording a degrade event when it is
    /// unusable.
    fn ensure_primary(&mut self, operation: &'static str) -> bool {
        if self.connections.ensure_connected(ConnectionRole::Primary, self.telemetry.as_ref()) {
            return true;
        }
        self.telemetry.record(RouterEvent::BestEffortDegraded {
            operation,
        });
        false
    }
}

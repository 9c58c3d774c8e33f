// crates/split-route-store-sqlite/src/counter.rs
// ============================================================================
// Module: Counter Store Router
// Description: Strict primary/replica routing for the token-counter store.
// Purpose: Gate write capability behind version and identity checks, then
//          dispatch delegated operations to the correct endpoint.
// Dependencies: rusqlite, split-route-core, thiserror
// ============================================================================

//! ## Overview
//! The counter store refuses to declare itself writable unless the full
//! version-gate plus identity-initialization sequence succeeds. Thereafter
//! every mutating operation is dispatched through the primary swap, while
//! read-only operations run unrouted against the replica. The router owns no
//! record arithmetic: it holds an external [`CounterOps`] value and supplies
//! it the resolved connection explicitly per call.
//! Invariants:
//! - Mutating operations require `writable()` and an established identity
//!   id; they never run against the replica.
//! - Lifecycle calls absorb connection and version failures; they downgrade
//!   capability instead of returning errors.
//! - Storage failures surface as explicit error results; nothing panics and
//!   nothing propagates untyped past this surface.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use rusqlite::Connection;
use split_route_core::CallerRole;
use split_route_core::ConnectionRole;
use split_route_core::CountDelta;
use split_route_core::CounterOps;
use split_route_core::FlagRecord;
use split_route_core::Identity;
use split_route_core::IdentityAuthorizer;
use split_route_core::IdentityId;
use split_route_core::NoopTelemetry;
use split_route_core::OpError;
use split_route_core::RouterEvent;
use split_route_core::RouterTelemetry;
use split_route_core::RoutingContext;
use split_route_core::StoreBackup;
use split_route_core::Token;
use split_route_core::TokenRecord;
use split_route_core::UnixSeconds;
use split_route_core::run_on_primary;
use thiserror::Error;

use crate::config::ConfigError;
use crate::config::RouterConfig;
use crate::config::validate_router_config;
use crate::connection::ConnectionSet;
use crate::connection::ReadinessTracker;
use crate::connection::check_version;
use crate::identity::ensure_identity;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Counter store routing errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Error messages avoid embedding record payloads.
#[derive(Debug, Error, Clone)]
pub enum CounterStoreError {
    /// A mutating operation was invoked before a successful writable tie.
    #[error("counter store is not writable")]
    NotWritable,
    /// A mutating operation was invoked with no identity id established.
    #[error("no identity id established for {0}")]
    NoIdentity(String),
    /// Identity initialization failed for a privileged caller.
    #[error("identity initialization failed: {0}")]
    Identity(String),
    /// Underlying storage query failed.
    #[error("counter store db error: {0}")]
    Storage(String),
    /// Invalid router configuration.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// The required endpoint connection is not available.
    #[error("connection unavailable: {}", .role.as_str())]
    Unavailable {
        /// Role whose connection was required.
        role: ConnectionRole,
    },
}

impl From<ConfigError> for CounterStoreError {
    fn from(error: ConfigError) -> Self {
        match error {
            ConfigError::Invalid(message) => Self::Invalid(message),
        }
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Strict router for the token-counter store.
///
/// One router serves one session for one identity. Connections open lazily;
/// `tie_writable` must succeed before any mutating operation is accepted.
pub struct CounterStoreRouter<O: CounterOps<Conn = Connection>> {
    /// Session configuration.
    config: RouterConfig,
    /// External operation set the router dispatches.
    ops: O,
    /// Identity the session is scoped to.
    identity: Identity,
    /// Primary/replica handle pair.
    connections: ConnectionSet,
    /// Readable/writable predicate state.
    readiness: ReadinessTracker,
    /// Identity id established by initialization, once known.
    identity_id: Option<IdentityId>,
    /// Optional veto hook consulted before identity creation.
    authorizer: Option<Box<dyn IdentityAuthorizer>>,
    /// Event sink for absorbed failures and capability transitions.
    telemetry: Arc<dyn RouterTelemetry>,
}

impl<O: CounterOps<Conn = Connection>> CounterStoreRouter<O> {
    /// Creates a router for one session; no connection is opened yet.
    ///
    /// # Errors
    ///
    /// Returns [`CounterStoreError::Invalid`] when the configuration fails
    /// validation.
    pub fn new(config: RouterConfig, identity: Identity, ops: O) -> Result<Self, CounterStoreError> {
        validate_router_config(&config)?;
        let connections = ConnectionSet::new(&config);
        Ok(Self {
            config,
            ops,
            identity,
            connections,
            readiness: ReadinessTracker::new(),
            identity_id: None,
            authorizer: None,
            telemetry: Arc::new(NoopTelemetry),
        })
    }

    /// Installs an identity-creation veto hook.
    #[must_use]
    pub fn with_authorizer(mut self, authorizer: Box<dyn IdentityAuthorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    /// Installs a telemetry sink.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Arc<dyn RouterTelemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Returns the identity the session is scoped to.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns the identity id, once initialization has established it.
    #[must_use]
    pub const fn identity_id(&self) -> Option<IdentityId> {
        self.identity_id
    }

    /// Returns true iff the replica handle is connected.
    #[must_use]
    pub fn readable(&self) -> bool {
        self.readiness.readable(&self.connections)
    }

    /// Returns true iff the primary handle is connected and the writable tie
    /// succeeded.
    #[must_use]
    pub fn writable(&self) -> bool {
        self.readiness.writable(&self.connections)
    }

    /// Returns true while the role's handle holds an open connection.
    #[must_use]
    pub fn is_connected(&self, role: ConnectionRole) -> bool {
        self.connections.handle(role).is_connected()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Runs the writable-tie sequence; returns the resulting writability.
    ///
    /// Resets the writable flag, connects the primary, checks its schema
    /// version against the expected constant, and initializes the identity
    /// row as a privileged caller. Every failure downgrades the session
    /// (version mismatches permanently, for this session) without raising;
    /// the read path is unaffected throughout.
    pub fn tie_writable(&mut self) -> bool {
        self.readiness.reset();
        if !self.connections.ensure_connected(ConnectionRole::Primary, self.telemetry.as_ref()) {
            return false;
        }
        let found =
            check_version(&mut self.connections, ConnectionRole::Primary, self.telemetry.as_ref());
        if found != self.config.expected_schema_version {
            self.telemetry.record(RouterEvent::VersionMismatch {
                found,
                expected: self.config.expected_schema_version,
            });
            self.connections.handle_mut(ConnectionRole::Primary).mark_failed();
            return false;
        }
        let mut ctx = RoutingContext::new();
        let established = ensure_identity(
            &mut self.connections,
            &mut ctx,
            &self.identity,
            true,
            CallerRole::Privileged,
            self.authorizer.as_deref(),
            self.telemetry.as_ref(),
        );
        match established {
            Ok(Some(id)) => {
                self.identity_id = Some(id);
                self.readiness.mark_writable();
                self.telemetry.record(RouterEvent::WritableTied {
                    identity: self.identity.to_string(),
                });
                true
            }
            Ok(None) | Err(_) => false,
        }
    }

    /// Ends the session's use of both endpoints.
    ///
    /// Disconnects primary and replica unconditionally and clears the
    /// writable flag. Idempotent; repeated calls are no-ops.
    pub fn untie(&mut self) {
        self.connections.teardown();
        self.readiness.reset();
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Dispatches one mutating operation routed to the primary.
    fn mutate<T>(
        &mut self,
        operation: &'static str,
        op: impl FnOnce(&O, &Connection, IdentityId) -> Result<T, OpError>,
    ) -> Result<T, CounterStoreError> {
        if !self.writable() {
            return Err(CounterStoreError::NotWritable);
        }
        let Some(id) = self.identity_id else {
            return Err(CounterStoreError::NoIdentity(self.identity.to_string()));
        };
        let connections = &self.connections;
        let ops = &self.ops;
        let telemetry = self.telemetry.as_ref();
        let mut ctx = RoutingContext::new();
        run_on_primary(&mut ctx, |ctx| {
            let Some(connection) = connections.active_connection(ctx) else {
                return Err(CounterStoreError::Unavailable {
                    role: ConnectionRole::Primary,
                });
            };
            match op(ops, connection, id) {
                Ok(value) => Ok(value),
                Err(err) => {
                    telemetry.record(RouterEvent::StorageError {
                        operation,
                        detail: err.to_string(),
                    });
                    Err(CounterStoreError::Storage(err.to_string()))
                }
            }
        })
    }

    /// Dispatches one read-only operation, unrouted, against the replica.
    ///
    /// Lazily connects the replica and lazily resolves the identity id as a
    /// delegated, non-creating caller; with no id established yet the
    /// operation resolves to `empty` without touching the store.
    fn read<T>(
        &mut self,
        operation: &'static str,
        empty: T,
        op: impl FnOnce(&O, &Connection, IdentityId) -> Result<T, OpError>,
    ) -> Result<T, CounterStoreError> {
        if !self.connections.ensure_connected(ConnectionRole::Replica, self.telemetry.as_ref()) {
            return Err(CounterStoreError::Unavailable {
                role: ConnectionRole::Replica,
            });
        }
        let Some(id) = self.resolve_identity()? else {
            return Ok(empty);
        };
        let ctx = RoutingContext::new();
        let Some(connection) = self.connections.active_connection(&ctx) else {
            return Err(CounterStoreError::Unavailable {
                role: ConnectionRole::Replica,
            });
        };
        match op(&self.ops, connection, id) {
            Ok(value) => Ok(value),
            Err(err) => {
                self.telemetry.record(RouterEvent::StorageError {
                    operation,
                    detail: err.to_string(),
                });
                Err(CounterStoreError::Storage(err.to_string()))
            }
        }
    }

    /// Resolves the identity id lazily for the read path.
    fn resolve_identity(&mut self) -> Result<Option<IdentityId>, CounterStoreError> {
        if let Some(id) = self.identity_id {
            return Ok(Some(id));
        }
        let mut ctx = RoutingContext::new();
        let resolved = ensure_identity(
            &mut self.connections,
            &mut ctx,
            &self.identity,
            false,
            CallerRole::Delegated,
            None,
            self.telemetry.as_ref(),
        )?;
        if let Some(id) = resolved {
            self.identity_id = Some(id);
        }
        Ok(resolved)
    }

    // ------------------------------------------------------------------
    // Delegated operations
    // ------------------------------------------------------------------

    /// Removes token records last seen before `before`; returns the count
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`CounterStoreError`] when the session is not writable or the
    /// delegated operation fails.
    pub fn expire_old_records(&mut self, before: UnixSeconds) -> Result<u64, CounterStoreError> {
        self.mutate("expire_old_records", |ops, conn, id| {
            ops.expire_old_records(conn, id, before)
        })
    }

    /// Fetches the flag record for `entity`, if present.
    ///
    /// # Errors
    ///
    /// Returns [`CounterStoreError`] when the replica is unavailable or the
    /// delegated operation fails.
    pub fn get_flag(&mut self, entity: &str) -> Result<Option<FlagRecord>, CounterStoreError> {
        self.read("get_flag", None, |ops, conn, id| ops.get_flag(conn, id, entity))
    }

    /// Inserts or replaces a flag record.
    ///
    /// # Errors
    ///
    /// Returns [`CounterStoreError`] when the session is not writable or the
    /// delegated operation fails.
    pub fn put_flag(&mut self, record: &FlagRecord) -> Result<(), CounterStoreError> {
        self.mutate("put_flag", |ops, conn, id| ops.put_flag(conn, id, record))
    }

    /// Deletes the flag record for `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`CounterStoreError`] when the session is not writable or the
    /// delegated operation fails.
    pub fn delete_flag(&mut self, entity: &str) -> Result<(), CounterStoreError> {
        self.mutate("delete_flag", |ops, conn, id| ops.delete_flag(conn, id, entity))
    }

    /// Returns every token record stored for the identity.
    ///
    /// # Errors
    ///
    /// Returns [`CounterStoreError`] when the replica is unavailable or the
    /// delegated operation fails.
    pub fn dump_records(&mut self) -> Result<Vec<TokenRecord>, CounterStoreError> {
        self.read("dump_records", Vec::new(), |ops, conn, id| ops.dump_records(conn, id))
    }

    /// Records the timestamp of the most recent expiry run.
    ///
    /// # Errors
    ///
    /// Returns [`CounterStoreError`] when the session is not writable or the
    /// delegated operation fails.
    pub fn set_last_expiry(&mut self, at: UnixSeconds) -> Result<(), CounterStoreError> {
        self.mutate("set_last_expiry", |ops, conn, id| ops.set_last_expiry(conn, id, at))
    }

    /// Applies a signed adjustment to one token's counters.
    ///
    /// # Errors
    ///
    /// Returns [`CounterStoreError`] when the session is not writable or the
    /// delegated operation fails.
    pub fn adjust_token_count(
        &mut self,
        token: &Token,
        delta: CountDelta,
    ) -> Result<(), CounterStoreError> {
        self.mutate("adjust_token_count", |ops, conn, id| {
            ops.adjust_token_count(conn, id, token, delta)
        })
    }

    /// Applies signed adjustments to a batch of tokens.
    ///
    /// # Errors
    ///
    /// Returns [`CounterStoreError`] when the session is not writable or the
    /// delegated operation fails.
    pub fn adjust_token_counts(
        &mut self,
        updates: &[(Token, CountDelta)],
    ) -> Result<(), CounterStoreError> {
        self.mutate("adjust_token_counts", |ops, conn, id| {
            ops.adjust_token_counts(conn, id, updates)
        })
    }

    /// Applies a signed adjustment to the identity's aggregate counters.
    ///
    /// # Errors
    ///
    /// Returns [`CounterStoreError`] when the session is not writable or the
    /// delegated operation fails.
    pub fn adjust_aggregate_counts(&mut self, delta: CountDelta) -> Result<(), CounterStoreError> {
        self.mutate("adjust_aggregate_counts", |ops, conn, id| {
            ops.adjust_aggregate_counts(conn, id, delta)
        })
    }

    /// Updates one token's last-seen timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`CounterStoreError`] when the session is not writable or the
    /// delegated operation fails.
    pub fn touch_timestamp(
        &mut self,
        token: &Token,
        at: UnixSeconds,
    ) -> Result<(), CounterStoreError> {
        self.mutate("touch_timestamp", |ops, conn, id| ops.touch_timestamp(conn, id, token, at))
    }

    /// Updates last-seen timestamps for a batch of tokens.
    ///
    /// # Errors
    ///
    /// Returns [`CounterStoreError`] when the session is not writable or the
    /// delegated operation fails.
    pub fn touch_timestamps(
        &mut self,
        tokens: &[Token],
        at: UnixSeconds,
    ) -> Result<(), CounterStoreError> {
        self.mutate("touch_timestamps", |ops, conn, id| ops.touch_timestamps(conn, id, tokens, at))
    }

    /// Removes orphaned or zeroed rows; returns the count removed.
    ///
    /// # Errors
    ///
    /// Returns [`CounterStoreError`] when the session is not writable or the
    /// delegated operation fails.
    pub fn cleanup(&mut self) -> Result<u64, CounterStoreError> {
        self.mutate("cleanup", |ops, conn, id| ops.cleanup(conn, id))
    }

    /// Removes every counter-store row for the identity.
    ///
    /// # Errors
    ///
    /// Returns [`CounterStoreError`] when the session is not writable or the
    /// delegated operation fails.
    pub fn clear_all(&mut self) -> Result<(), CounterStoreError> {
        self.mutate("clear_all", |ops, conn, id| ops.clear_all(conn, id))
    }

    /// Produces a complete counter-store snapshot for the identity.
    ///
    /// # Errors
    ///
    /// Returns [`CounterStoreError`] when the replica is unavailable or the
    /// delegated operation fails.
    pub fn backup(&mut self) -> Result<StoreBackup, CounterStoreError> {
        self.read("backup", StoreBackup::default(), |ops, conn, id| ops.backup(conn, id))
    }

    /// Replaces the identity's counter-store contents with the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`CounterStoreError`] when the session is not writable or the
    /// delegated operation fails.
    pub fn restore(&mut self, backup: &StoreBackup) -> Result<(), CounterStoreError> {
        self.mutate("restore", |ops, conn, id| ops.restore(conn, id, backup))
    }
}

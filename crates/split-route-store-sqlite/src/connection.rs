// crates/split-route-store-sqlite/src/connection.rs
// ============================================================================
// Module: Connection Set and Version Gate
// Description: Primary/replica handle lifecycle, schema-version cache, and
//              readiness predicates.
// Purpose: Own the two endpoint connections and the capability state derived
//          from them.
// Dependencies: rusqlite, split-route-core
// ============================================================================

//! ## Overview
//! A session owns exactly one [`ConnectionSet`]: a writable primary handle
//! and a read-only replica handle, each independently connectable and
//! closable. Connections open lazily on first need and stay open until
//! teardown; there is no pooling and no retry. A handle whose connect (or
//! version check) failed is marked failed and never retried within the
//! session, so a broken endpoint downgrades capability exactly once.
//! Invariants:
//! - Close is idempotent; teardown may run any number of times.
//! - The schema version is fetched at most once per connection and cached
//!   per role for the connection's lifetime; disconnecting clears the cache.
//! - A connected primary alone never implies writability; the explicit flag
//!   on [`ReadinessTracker`] must also be set.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use split_route_core::ConnectionRole;
use split_route_core::RouterEvent;
use split_route_core::RouterTelemetry;
use split_route_core::RoutingContext;

use crate::config::EndpointConfig;
use crate::config::RouterConfig;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Fixed metadata lookup resolving the schema version an endpoint advertises.
const VERSION_LOOKUP_SQL: &str = "SELECT value FROM store_vars WHERE variable = 'VERSION'";

// ============================================================================
// SECTION: Connection Handle
// ============================================================================

/// One endpoint connection with its lifecycle state.
///
/// # Invariants
/// - `failed` is sticky for the session: once set, `connect` refuses without
///   touching the endpoint again.
/// - `cached_version` is `Some` only while `connection` is `Some`.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Role this handle serves.
    role: ConnectionRole,
    /// Endpoint settings used to open the connection.
    settings: EndpointConfig,
    /// Open connection, when connected.
    connection: Option<Connection>,
    /// Sticky failure marker; set on connect failure or version mismatch.
    failed: bool,
    /// Schema version cached for this connection's lifetime.
    cached_version: Option<i64>,
}

impl ConnectionHandle {
    /// Creates a disconnected handle for the role and endpoint.
    fn new(role: ConnectionRole, settings: EndpointConfig) -> Self {
        Self {
            role,
            settings,
            connection: None,
            failed: false,
            cached_version: None,
        }
    }

    /// Returns true while the handle holds an open connection.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Returns the open connection, if any.
    pub(crate) const fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    /// Returns the cached schema version, if one was fetched on this
    /// connection.
    pub(crate) const fn cached_version(&self) -> Option<i64> {
        self.cached_version
    }

    /// Caches the schema version for this connection's lifetime.
    pub(crate) const fn set_cached_version(&mut self, version: i64) {
        self.cached_version = Some(version);
    }

    /// Connects lazily; returns true when a connection is available.
    ///
    /// A handle that failed before refuses immediately. A fresh connect
    /// failure emits a telemetry event and marks the handle failed for the
    /// rest of the session.
    fn connect(&mut self, telemetry: &dyn RouterTelemetry) -> bool {
        if self.connection.is_some() {
            return true;
        }
        if self.failed {
            return false;
        }
        match open_endpoint(self.role, &self.settings) {
            Ok(connection) => {
                self.connection = Some(connection);
                true
            }
            Err(err) => {
                telemetry.record(RouterEvent::ConnectFailed {
                    role: self.role,
                    detail: err.to_string(),
                });
                self.failed = true;
                false
            }
        }
    }

    /// Closes the connection if open and clears the version cache.
    ///
    /// Idempotent; repeated calls are no-ops once disconnected.
    fn disconnect(&mut self) {
        self.connection = None;
        self.cached_version = None;
    }

    /// Disconnects and marks the handle failed for the session.
    pub(crate) fn mark_failed(&mut self) {
        self.disconnect();
        self.failed = true;
    }
}

/// Opens one endpoint connection with role-appropriate flags.
///
/// The replica opens read-only, mirroring its contractual role; the primary
/// opens read-write and may create the database file.
fn open_endpoint(
    role: ConnectionRole,
    settings: &EndpointConfig,
) -> Result<Connection, rusqlite::Error> {
    let flags = match role {
        ConnectionRole::Primary => {
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX
        }
        ConnectionRole::Replica => {
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_FULL_MUTEX
        }
    };
    let connection = Connection::open_with_flags(&settings.path, flags)?;
    connection.busy_timeout(Duration::from_millis(settings.busy_timeout_ms))?;
    Ok(connection)
}

// ============================================================================
// SECTION: Connection Set
// ============================================================================

/// The primary/replica handle pair owned by one session.
#[derive(Debug)]
pub struct ConnectionSet {
    /// Writable primary handle.
    primary: ConnectionHandle,
    /// Read-only replica handle.
    replica: ConnectionHandle,
}

impl ConnectionSet {
    /// Creates a set with both handles disconnected.
    #[must_use]
    pub fn new(config: &RouterConfig) -> Self {
        Self {
            primary: ConnectionHandle::new(ConnectionRole::Primary, config.primary.clone()),
            replica: ConnectionHandle::new(ConnectionRole::Replica, config.replica.clone()),
        }
    }

    /// Returns the handle for the role.
    #[must_use]
    pub const fn handle(&self, role: ConnectionRole) -> &ConnectionHandle {
        match role {
            ConnectionRole::Primary => &self.primary,
            ConnectionRole::Replica => &self.replica,
        }
    }

    /// Returns the mutable handle for the role.
    pub(crate) const fn handle_mut(&mut self, role: ConnectionRole) -> &mut ConnectionHandle {
        match role {
            ConnectionRole::Primary => &mut self.primary,
            ConnectionRole::Replica => &mut self.replica,
        }
    }

    /// Connects the role's handle lazily; returns true when usable.
    pub(crate) fn ensure_connected(
        &mut self,
        role: ConnectionRole,
        telemetry: &dyn RouterTelemetry,
    ) -> bool {
        self.handle_mut(role).connect(telemetry)
    }

    /// Returns the open connection for the role, if any.
    pub(crate) const fn connection(&self, role: ConnectionRole) -> Option<&Connection> {
        self.handle(role).connection()
    }

    /// Returns the connection for the role the context currently routes to.
    pub(crate) const fn active_connection(&self, ctx: &RoutingContext) -> Option<&Connection> {
        self.connection(ctx.active())
    }

    /// Disconnects both handles unconditionally.
    ///
    /// Idempotent; safe to call after a failed connect and safe to repeat.
    pub fn teardown(&mut self) {
        self.primary.disconnect();
        self.replica.disconnect();
    }
}

// ============================================================================
// SECTION: Version Gate
// ============================================================================

/// Resolves the schema version advertised by the role's endpoint.
///
/// Returns 0 when the handle is not connected. Executes the fixed metadata
/// lookup once per connection and caches the result for the connection's
/// lifetime; separate caches per role, since primary and replica may be at
/// different versions during a rolling upgrade. Never returns an error: a
/// failed or unparsable lookup emits a telemetry event and yields 0 without
/// caching, so a transient fault does not pin an intact connection to 0.
pub(crate) fn check_version(
    set: &mut ConnectionSet,
    role: ConnectionRole,
    telemetry: &dyn RouterTelemetry,
) -> i64 {
    if let Some(version) = set.handle(role).cached_version() {
        return version;
    }
    let fetched = {
        let Some(connection) = set.connection(role) else {
            return 0;
        };
        fetch_version(connection)
    };
    match fetched {
        Ok(Some(version)) => {
            set.handle_mut(role).set_cached_version(version);
            version
        }
        Ok(None) => 0,
        Err(detail) => {
            telemetry.record(RouterEvent::VersionProbeFailed {
                role,
                detail,
            });
            0
        }
    }
}

/// Executes the version lookup and parses the stored value.
fn fetch_version(connection: &Connection) -> Result<Option<i64>, String> {
    let value: Option<String> = connection
        .query_row(VERSION_LOOKUP_SQL, [], |row| row.get(0))
        .optional()
        .map_err(|err| err.to_string())?;
    match value {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| format!("unparsable schema version value: {raw}")),
    }
}

// ============================================================================
// SECTION: Readiness
// ============================================================================

/// Independent readable/writable predicates for one session.
///
/// # Invariants
/// - The writable flag is reset at the start of every writable-tie attempt
///   and set only after the version gate and identity initialization both
///   succeed.
#[derive(Debug, Default)]
pub struct ReadinessTracker {
    /// Explicit writable flag set by a successful writable tie.
    writable: bool,
}

impl ReadinessTracker {
    /// Creates a tracker with the writable flag clear.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            writable: false,
        }
    }

    /// Clears the writable flag.
    pub(crate) const fn reset(&mut self) {
        self.writable = false;
    }

    /// Sets the writable flag after a successful tie.
    pub(crate) const fn mark_writable(&mut self) {
        self.writable = true;
    }

    /// Returns true iff the replica handle is connected.
    #[must_use]
    pub fn readable(&self, set: &ConnectionSet) -> bool {
        set.handle(ConnectionRole::Replica).is_connected()
    }

    /// Returns true iff the primary handle is connected and the writable
    /// flag is set.
    #[must_use]
    pub fn writable(&self, set: &ConnectionSet) -> bool {
        self.writable && set.handle(ConnectionRole::Primary).is_connected()
    }
}

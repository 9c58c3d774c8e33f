// crates/split-route-store-sqlite/src/identity.rs
// ============================================================================
// Module: Identity Initializer
// Description: Lazy, race-tolerant creation of per-identity anchor rows.
// Purpose: Ensure exactly one identity row exists on the shared primary.
// Dependencies: rusqlite, split-route-core
// ============================================================================

//! ## Overview
//! Multiple uncoordinated writer processes share one primary and may race to
//! create the same identity row. Rather than coordinate via a lock, this
//! module leans on the storage layer's uniqueness constraint as the arbiter:
//! insert, swallow the uniqueness rejection as a benign lost race, and
//! re-read to obtain the winner's id. Initialization is idempotent and
//! lock-free at the cost of one extra round trip on the losing side.
//! Invariants:
//! - The initial lookup runs on the handle currently active for reads
//!   (normally the replica); the insert and re-read run routed to the
//!   primary, so the re-read observes the row regardless of who won.
//! - A delegated caller tolerates "no id yet" as success; a privileged
//!   caller that cannot establish an id fails.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OptionalExtension;
use rusqlite::params;
use split_route_core::CallerRole;
use split_route_core::ConnectionRole;
use split_route_core::Identity;
use split_route_core::IdentityAuthorizer;
use split_route_core::IdentityId;
use split_route_core::RouterEvent;
use split_route_core::RouterTelemetry;
use split_route_core::RoutingContext;
use split_route_core::run_on_primary;

use crate::connection::ConnectionSet;
use crate::counter::CounterStoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Fixed lookup resolving an identity string to its assigned id.
const IDENTITY_LOOKUP_SQL: &str = "SELECT id FROM identities WHERE identity = ?1";

/// Fixed insert creating a new identity row; uniqueness is enforced by the
/// storage layer.
const IDENTITY_INSERT_SQL: &str = "INSERT INTO identities (identity) VALUES (?1)";

// ============================================================================
// SECTION: Error Classification
// ============================================================================

/// Returns true when the error is the storage layer's uniqueness rejection.
///
/// This predicate is the only place the duplicate-key mapping lives; a
/// different backend changes the classification here and nowhere else.
fn is_unique_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
    )
}

// ============================================================================
// SECTION: Lookup
// ============================================================================

/// Resolves the identity row's id on the provided connection.
fn query_identity(
    connection: &Connection,
    identity: &Identity,
) -> Result<Option<IdentityId>, CounterStoreError> {
    let raw: Option<i64> = connection
        .query_row(IDENTITY_LOOKUP_SQL, params![identity.as_str()], |row| row.get(0))
        .optional()
        .map_err(|err| CounterStoreError::Storage(err.to_string()))?;
    match raw {
        None => Ok(None),
        Some(value) => {
            let id = u64::try_from(value).ok().and_then(IdentityId::from_raw).ok_or_else(|| {
                CounterStoreError::Storage(format!(
                    "invalid identity id {value} for identity {identity}"
                ))
            })?;
            Ok(Some(id))
        }
    }
}

/// Looks up the identity on the handle the context currently routes to.
///
/// An unusable active handle resolves to "not found" rather than an error,
/// so capability downgrades surface through the readiness predicates instead
/// of failing the initialization sequence outright.
fn lookup_on_active(
    set: &mut ConnectionSet,
    ctx: &RoutingContext,
    identity: &Identity,
    telemetry: &dyn RouterTelemetry,
) -> Result<Option<IdentityId>, CounterStoreError> {
    if !set.ensure_connected(ctx.active(), telemetry) {
        return Ok(None);
    }
    let Some(connection) = set.active_connection(ctx) else {
        return Ok(None);
    };
    match query_identity(connection, identity) {
        Ok(found) => Ok(found),
        Err(err) => {
            telemetry.record(RouterEvent::StorageError {
                operation: "identity_lookup",
                detail: err.to_string(),
            });
            Err(err)
        }
    }
}

// ============================================================================
// SECTION: Initialization
// ============================================================================

/// Ensures exactly one identity row exists, tolerant of creation races.
///
/// Sequence: look up on the active read handle; absent that, a privileged
/// caller with a usable primary (and an authorization pass) inserts routed
/// to the primary, swallows a uniqueness rejection as a lost race, and
/// re-runs the lookup inside the routed section to obtain the id either way.
///
/// # Errors
///
/// Returns [`CounterStoreError`] when a privileged caller cannot establish
/// an id: creation not requested or vetoed, primary unavailable, or a
/// storage failure other than the benign uniqueness rejection. A delegated
/// caller resolves to `Ok(None)` instead wherever no id exists yet.
pub(crate) fn ensure_identity(
    set: &mut ConnectionSet,
    ctx: &mut RoutingContext,
    identity: &Identity,
    create_if_missing: bool,
    caller: CallerRole,
    authorizer: Option<&dyn IdentityAuthorizer>,
    telemetry: &dyn RouterTelemetry,
) -> Result<Option<IdentityId>, CounterStoreError> {
    if let Some(id) = lookup_on_active(set, ctx, identity, telemetry)? {
        return Ok(Some(id));
    }
    let create_possible = create_if_missing
        && caller.is_privileged()
        && set.ensure_connected(ConnectionRole::Primary, telemetry);
    if !create_possible {
        if caller.is_privileged() {
            return Err(CounterStoreError::Identity(format!(
                "cannot establish an id for identity {identity}"
            )));
        }
        return Ok(None);
    }
    if let Some(authorizer) = authorizer
        && !authorizer.allow_identity_creation(identity)
    {
        telemetry.record(RouterEvent::IdentityCreationVetoed {
            identity: identity.to_string(),
        });
        return Err(CounterStoreError::Identity(format!(
            "identity creation vetoed for {identity}"
        )));
    }
    run_on_primary(ctx, |ctx| {
        let Some(connection) = set.active_connection(ctx) else {
            return Err(CounterStoreError::Unavailable {
                role: ConnectionRole::Primary,
            });
        };
        match connection.execute(IDENTITY_INSERT_SQL, params![identity.as_str()]) {
            Ok(_) => {}
            // Lost the creation race to another writer node; the re-read
            // below resolves the winner's id.
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => {
                telemetry.record(RouterEvent::StorageError {
                    operation: "identity_insert",
                    detail: err.to_string(),
                });
                return Err(CounterStoreError::Storage(err.to_string()));
            }
        }
        match query_identity(connection, identity) {
            Ok(Some(id)) => Ok(Some(id)),
            Ok(None) => Err(CounterStoreError::Identity(format!(
                "identity row missing after insert for {identity}"
            ))),
            Err(err) => {
                telemetry.record(RouterEvent::StorageError {
                    operation: "identity_reread",
                    detail: err.to_string(),
                });
                Err(err)
            }
        }
    })
}

// crates/split-route-core/src/interfaces.rs
// ============================================================================
// Module: Split Route Interfaces
// Description: Backend-agnostic contract surfaces for delegated operations.
// Purpose: Define the operation sets the routers dispatch, plus the identity
//          authorization hook.
// Dependencies: thiserror, crate::identifiers, crate::records
// ============================================================================

//! ## Overview
//! The routing layer owns connection selection and capability gating; the
//! record arithmetic itself lives behind these traits. Routers hold an
//! operation value and hand it the resolved connection explicitly per call,
//! so implementations never read connection state from shared fields.
//! Invariants:
//! - Implementations must treat the supplied connection as borrowed for the
//!   single call only.
//! - Implementations signal failures through [`OpError`]; they must not
//!   panic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::identifiers::Identity;
use crate::identifiers::IdentityId;
use crate::records::CountDelta;
use crate::records::FlagRecord;
use crate::records::ReputationEntry;
use crate::records::StoreBackup;
use crate::records::Token;
use crate::records::TokenRecord;
use crate::records::UnixSeconds;

// ============================================================================
// SECTION: Operation Errors
// ============================================================================

/// Failure raised by a delegated operation implementation.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum OpError {
    /// Underlying storage query failed.
    #[error("storage operation failed: {0}")]
    Storage(String),
}

// ============================================================================
// SECTION: Counter Operations
// ============================================================================

/// Operation set of the token-counter store, delegated through the strict
/// router.
///
/// The connection type is abstract so the contract stays backend-agnostic;
/// the router supplies the connection it resolved for the call, and the
/// implementation owns the query shapes executed against it.
pub trait CounterOps {
    /// Connection handle type supplied by the routing layer.
    type Conn;

    /// Removes token records last seen before `before`; returns the count
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`OpError`] when the underlying query fails.
    fn expire_old_records(
        &self,
        conn: &Self::Conn,
        id: IdentityId,
        before: UnixSeconds,
    ) -> Result<u64, OpError>;

    /// Fetches the flag record for `entity`, if present.
    ///
    /// # Errors
    ///
    /// Returns [`OpError`] when the underlying query fails.
    fn get_flag(
        &self,
        conn: &Self::Conn,
        id: IdentityId,
        entity: &str,
    ) -> Result<Option<FlagRecord>, OpError>;

    /// Inserts or replaces the flag record.
    ///
    /// # Errors
    ///
    /// Returns [`OpError`] when the underlying query fails.
    fn put_flag(&self, conn: &Self::Conn, id: IdentityId, record: &FlagRecord)
    -> Result<(), OpError>;

    /// Deletes the flag record for `entity`; absent records are a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`OpError`] when the underlying query fails.
    fn delete_flag(&self, conn: &Self::Conn, id: IdentityId, entity: &str) -> Result<(), OpError>;

    /// Returns every token record stored for the identity.
    ///
    /// # Errors
    ///
    /// Returns [`OpError`] when the underlying query fails.
    fn dump_records(&self, conn: &Self::Conn, id: IdentityId) -> Result<Vec<TokenRecord>, OpError>;

    /// Records the timestamp of the most recent expiry run.
    ///
    /// # Errors
    ///
    /// Returns [`OpError`] when the underlying query fails.
    fn set_last_expiry(
        &self,
        conn: &Self::Conn,
        id: IdentityId,
        at: UnixSeconds,
    ) -> Result<(), OpError>;

    /// Applies a signed adjustment to one token's counters, creating the row
    /// if absent.
    ///
    /// # Errors
    ///
    /// Returns [`OpError`] when the underlying query fails.
    fn adjust_token_count(
        &self,
        conn: &Self::Conn,
        id: IdentityId,
        token: &Token,
        delta: CountDelta,
    ) -> Result<(), OpError>;

    /// Applies signed adjustments to a batch of tokens.
    ///
    /// # Errors
    ///
    /// Returns [`OpError`] when the underlying query fails.
    fn adjust_token_counts(
        &self,
        conn: &Self::Conn,
        id: IdentityId,
        updates: &[(Token, CountDelta)],
    ) -> Result<(), OpError>;

    /// Applies a signed adjustment to the identity's aggregate counters.
    ///
    /// # Errors
    ///
    /// Returns [`OpError`] when the underlying query fails.
    fn adjust_aggregate_counts(
        &self,
        conn: &Self::Conn,
        id: IdentityId,
        delta: CountDelta,
    ) -> Result<(), OpError>;

    /// Updates one token's last-seen timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`OpError`] when the underlying query fails.
    fn touch_timestamp(
        &self,
        conn: &Self::Conn,
        id: IdentityId,
        token: &Token,
        at: UnixSeconds,
    ) -> Result<(), OpError>;

    /// Updates last-seen timestamps for a batch of tokens.
    ///
    /// # Errors
    ///
    /// Returns [`OpError`] when the underlying query fails.
    fn touch_timestamps(
        &self,
        conn: &Self::Conn,
        id: IdentityId,
        tokens: &[Token],
        at: UnixSeconds,
    ) -> Result<(), OpError>;

    /// Removes orphaned or zeroed rows; returns the count removed.
    ///
    /// # Errors
    ///
    /// Returns [`OpError`] when the underlying query fails.
    fn cleanup(&self, conn: &Self::Conn, id: IdentityId) -> Result<u64, OpError>;

    /// Removes every counter-store row for the identity.
    ///
    /// # Errors
    ///
    /// Returns [`OpError`] when the underlying query fails.
    fn clear_all(&self, conn: &Self::Conn, id: IdentityId) -> Result<(), OpError>;

    /// Produces a complete counter-store snapshot for the identity.
    ///
    /// # Errors
    ///
    /// Returns [`OpError`] when the underlying query fails.
    fn backup(&self, conn: &Self::Conn, id: IdentityId) -> Result<StoreBackup, OpError>;

    /// Replaces the identity's counter-store contents with the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`OpError`] when the underlying query fails.
    fn restore(
        &self,
        conn: &Self::Conn,
        id: IdentityId,
        backup: &StoreBackup,
    ) -> Result<(), OpError>;
}

// ============================================================================
// SECTION: Reputation Operations
// ============================================================================

/// Operation set of the reputation store, delegated through the best-effort
/// router.
pub trait ReputationOps {
    /// Connection handle type supplied by the routing layer.
    type Conn;

    /// Applies an in-place increment of hit count and accumulated score,
    /// creating the row if absent; returns the updated entry.
    ///
    /// # Errors
    ///
    /// Returns [`OpError`] when the underlying query fails.
    fn add_score(
        &self,
        conn: &Self::Conn,
        table: &str,
        entry: &ReputationEntry,
        delta: f64,
    ) -> Result<ReputationEntry, OpError>;

    /// Deletes the entry addressed by the entry's key; absent rows are a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`OpError`] when the underlying query fails.
    fn remove_entry(
        &self,
        conn: &Self::Conn,
        table: &str,
        entry: &ReputationEntry,
    ) -> Result<(), OpError>;
}

// ============================================================================
// SECTION: Identity Authorization
// ============================================================================

/// External veto hook consulted before an identity row is created.
pub trait IdentityAuthorizer {
    /// Returns true when creation of a row for `identity` is permitted.
    fn allow_identity_creation(&self, identity: &Identity) -> bool;
}

/// Authorizer that permits every identity creation.
///
/// # Invariants
/// - Stateless; behaves identically for every identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllAuthorizer;

impl IdentityAuthorizer for AllowAllAuthorizer {
    fn allow_identity_creation(&self, _identity: &Identity) -> bool {
        true
    }
}

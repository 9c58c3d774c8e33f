// crates/split-route-core/src/records.rs
// ============================================================================
// Module: Split Route Record Types
// Description: Value types crossing the delegated-operation seam.
// Purpose: Carry counter, flag, backup, and reputation data between routers
//          and external operation implementations.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Record types exchanged between the routing layer and the external
//! operation implementations it delegates to. Timestamps are explicit
//! caller-supplied values; this layer never reads wall-clock time, so
//! sessions remain deterministic and replayable in tests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::Identity;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Unix-epoch timestamp in seconds, supplied by the host.
///
/// # Invariants
/// - Values are explicitly provided by callers; this layer never reads
///   wall-clock time.
/// - No validation is performed; monotonicity is a caller responsibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnixSeconds(i64);

impl UnixSeconds {
    /// Creates a timestamp from unix seconds.
    #[must_use]
    pub const fn new(seconds: i64) -> Self {
        Self(seconds)
    }

    /// Returns the raw unix seconds value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UnixSeconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Counter Records
// ============================================================================

/// Opaque token key tracked by the counter store.
///
/// # Invariants
/// - Opaque UTF-8 string; tokenization is a caller responsibility.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Creates a new token key.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Signed adjustment applied to a pair of class counters.
///
/// # Invariants
/// - Deltas may be negative; clamping at zero is the responsibility of the
///   external operation implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountDelta {
    /// Adjustment to the spam-class counter.
    pub spam: i64,
    /// Adjustment to the ham-class counter.
    pub ham: i64,
}

/// Per-token counter state as stored for one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Token key.
    pub token: Token,
    /// Spam-class occurrence count.
    pub spam_count: u64,
    /// Ham-class occurrence count.
    pub ham_count: u64,
    /// Timestamp of the most recent observation.
    pub last_seen: UnixSeconds,
}

/// Named flag record attached to an entity under one identity.
///
/// # Invariants
/// - `entity` is unique per identity at the storage layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagRecord {
    /// Entity key the flag is attached to.
    pub entity: String,
    /// Flag value.
    pub value: String,
}

/// Aggregate counter state for one identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateCounts {
    /// Total spam-class observations.
    pub spam_count: u64,
    /// Total ham-class observations.
    pub ham_count: u64,
    /// Number of distinct tokens currently stored.
    pub token_count: u64,
    /// Timestamp of the most recent expiry run.
    pub last_expiry: UnixSeconds,
}

/// Complete counter-store snapshot for one identity.
///
/// # Invariants
/// - `aggregates` reflect the contained `tokens` at snapshot time; the
///   routing layer treats the payload as opaque and never recomputes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreBackup {
    /// Aggregate counters at snapshot time.
    pub aggregates: AggregateCounts,
    /// All token records for the identity.
    pub tokens: Vec<TokenRecord>,
    /// All flag records for the identity.
    pub flags: Vec<FlagRecord>,
}

// ============================================================================
// SECTION: Reputation Records
// ============================================================================

/// Composite key addressing one reputation entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReputationKey {
    /// Identity owning the entry.
    pub identity: Identity,
    /// Secondary key partitioning entries within an identity.
    pub scope: String,
    /// Signer attribution for the entry.
    pub signer: String,
    /// Origin address attribution for the entry.
    pub address: String,
}

/// Reputation entry holding a hit count and an accumulated score.
///
/// # Invariants
/// - Created lazily by the external operation on first score update; never
///   implicitly deleted by the routing layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationEntry {
    /// Composite entry key.
    pub key: ReputationKey,
    /// Number of score observations recorded.
    pub hits: u64,
    /// Accumulated score total.
    pub score_total: f64,
}

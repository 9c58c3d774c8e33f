// crates/split-route-core/src/telemetry.rs
// ============================================================================
// Module: Split Route Telemetry
// Description: Observability hooks for routing and capability events.
// Purpose: Provide structured router events without hard dependencies.
// Dependencies: crate::routing
// ============================================================================

//! ## Overview
//! This module exposes a thin event interface for routing-layer
//! observability. It is intentionally dependency-light so downstream
//! deployments can plug in their logging or metrics backend without
//! redesign. Routers emit events at the point a failure is absorbed; no
//! event is ever a substitute for an error result the caller should see.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::routing::ConnectionRole;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Structured event emitted by the routing layer.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
/// - Detail strings never embed record payloads, only error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterEvent {
    /// Connecting an endpoint failed; the capability it backs is downgraded
    /// for the remainder of the session.
    ConnectFailed {
        /// Role of the endpoint that failed to connect.
        role: ConnectionRole,
        /// Driver error text.
        detail: String,
    },
    /// The primary reported a schema version other than the expected one;
    /// the writable path was aborted.
    VersionMismatch {
        /// Version reported by the primary (0 when unknown).
        found: i64,
        /// Version required for write capability.
        expected: i64,
    },
    /// The version metadata lookup itself failed; treated as version 0.
    VersionProbeFailed {
        /// Role of the endpoint probed.
        role: ConnectionRole,
        /// Driver error text.
        detail: String,
    },
    /// The authorization hook vetoed creation of an identity row.
    IdentityCreationVetoed {
        /// Identity whose creation was refused.
        identity: String,
    },
    /// A storage query failed and the operation was aborted.
    StorageError {
        /// Stable label of the failing operation.
        operation: &'static str,
        /// Driver or implementation error text.
        detail: String,
    },
    /// A best-effort operation degraded to a no-op because the primary was
    /// unavailable.
    BestEffortDegraded {
        /// Stable label of the degraded operation.
        operation: &'static str,
    },
    /// The writable-tie sequence completed and write capability is active.
    WritableTied {
        /// Identity the session is tied to.
        identity: String,
    },
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Event sink for routing-layer observability.
pub trait RouterTelemetry: Send + Sync {
    /// Records one router event.
    fn record(&self, event: RouterEvent);
}

/// No-op telemetry sink.
///
/// # Invariants
/// - Events are intentionally discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl RouterTelemetry for NoopTelemetry {
    fn record(&self, _event: RouterEvent) {}
}

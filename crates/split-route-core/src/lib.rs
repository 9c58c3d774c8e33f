// crates/split-route-core/src/lib.rs
// ============================================================================
// Module: Split Route Core Library
// Description: Backend-agnostic types and contract surfaces for Split Route.
// Purpose: Define routing state, record types, and delegated-operation seams.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Split Route Core carries the backend-agnostic half of the routing layer:
//! the [`RoutingContext`] swap mechanism, the identifier and record types,
//! the delegated-operation traits ([`CounterOps`], [`ReputationOps`]), the
//! identity authorization hook, and the telemetry surface.
//! Invariants:
//! - The swap mechanism is balanced: after an outermost [`run_on_primary`]
//!   returns, the active role equals the role before the call began.
//! - No type in this crate reads wall-clock time or touches a database;
//!   backends live in sibling crates.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod identifiers;
pub mod interfaces;
pub mod records;
pub mod routing;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use identifiers::Identity;
pub use identifiers::IdentityId;
pub use interfaces::AllowAllAuthorizer;
pub use interfaces::CounterOps;
pub use interfaces::IdentityAuthorizer;
pub use interfaces::OpError;
pub use interfaces::ReputationOps;
pub use records::AggregateCounts;
pub use records::CountDelta;
pub use records::FlagRecord;
pub use records::ReputationEntry;
pub use records::ReputationKey;
pub use records::StoreBackup;
pub use records::Token;
pub use records::TokenRecord;
pub use records::UnixSeconds;
pub use routing::CallerRole;
pub use routing::ConnectionRole;
pub use routing::RoutingContext;
pub use routing::run_on_primary;
pub use telemetry::NoopTelemetry;
pub use telemetry::RouterEvent;
pub use telemetry::RouterTelemetry;

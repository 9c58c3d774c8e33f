// crates/split-route-core/src/routing.rs
// ============================================================================
// Module: Split Route Routing Context
// Description: Active-connection tracking and the primary-swap mechanism.
// Purpose: Redirect delegated operations to the primary without double
//          swapping under nested calls.
// Dependencies: std
// ============================================================================

//! ## Overview
//! A [`RoutingContext`] records which connection role delegated operations
//! should run against, plus a single-slot reentrancy guard. Contexts are
//! created fresh at each public entry point and passed by reference down the
//! call chain, so the guard is a property of one logical operation rather
//! than of a long-lived session object.
//! Invariants:
//! - Only the outermost [`run_on_primary`] invocation changes the active
//!   role; nested invocations observe it already set and pass through.
//! - After the outermost invocation returns, the active role equals the role
//!   before the invocation began and the guard is clear.
//! - Single-threaded by contract; no locking.

// ============================================================================
// SECTION: Roles
// ============================================================================

/// Role of a connection endpoint within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionRole {
    /// The sole writable endpoint.
    Primary,
    /// A read-only endpoint, potentially lagging the primary.
    Replica,
}

impl ConnectionRole {
    /// Returns a stable label for the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Replica => "replica",
        }
    }
}

/// Capability of the caller entering the routing layer.
///
/// Threaded explicitly from the public entry point down the call chain; inner
/// calls never infer their caller's capability at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerRole {
    /// Entry through a write-capable surface; may create identity rows.
    Privileged,
    /// Entry through a read surface or an inner delegated call; tolerates an
    /// unassigned identity id.
    Delegated,
}

impl CallerRole {
    /// Returns true for the write-capable caller role.
    #[must_use]
    pub const fn is_privileged(self) -> bool {
        matches!(self, Self::Privileged)
    }
}

// ============================================================================
// SECTION: Routing Context
// ============================================================================

/// Per-operation routing state: active role plus the reentrancy guard.
///
/// # Invariants
/// - `active` starts at [`ConnectionRole::Replica`]; reads are unrouted.
/// - `engaged` is the single-slot guard; it is set only by the outermost
///   [`run_on_primary`] and cleared when that invocation returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingContext {
    /// Role delegated operations currently resolve their connection from.
    active: ConnectionRole,
    /// Reentrancy guard; true while a primary swap is in effect.
    engaged: bool,
}

impl RoutingContext {
    /// Creates a context with the replica active and the guard clear.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            active: ConnectionRole::Replica,
            engaged: false,
        }
    }

    /// Returns the role delegated operations should run against.
    #[must_use]
    pub const fn active(&self) -> ConnectionRole {
        self.active
    }

    /// Returns true while a primary swap is in effect.
    #[must_use]
    pub const fn is_engaged(&self) -> bool {
        self.engaged
    }

    /// Swaps the active role to primary and sets the guard, returning the
    /// previous role for the matching [`Self::restore`].
    fn engage(&mut self) -> ConnectionRole {
        let previous = self.active;
        self.active = ConnectionRole::Primary;
        self.engaged = true;
        previous
    }

    /// Restores the previous active role and clears the guard.
    fn restore(&mut self, previous: ConnectionRole) {
        self.active = previous;
        self.engaged = false;
    }
}

impl Default for RoutingContext {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SECTION: Primary Swap
// ============================================================================

/// Runs `operation` with the context routed to the primary.
///
/// The outermost invocation swaps the active role to primary for the
/// duration of `operation` and restores the previous role after. A nested
/// invocation (guard already set) invokes `operation` with the context
/// unchanged and leaves the guard untouched, so an operation that internally
/// calls another routed operation cannot flip-flop the active role
/// mid-execution.
pub fn run_on_primary<T>(
    ctx: &mut RoutingContext,
    operation: impl FnOnce(&mut RoutingContext) -> T,
) -> T {
    if ctx.engaged {
        return operation(ctx);
    }
    let previous = ctx.engage();
    let outcome = operation(ctx);
    ctx.restore(previous);
    outcome
}

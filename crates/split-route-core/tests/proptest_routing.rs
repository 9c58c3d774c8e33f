// crates/split-route-core/tests/proptest_routing.rs
// ============================================================================
// Module: Routing Property-Based Tests
// Description: Property tests for swap balance under arbitrary nesting.
// Purpose: Detect unbalanced swaps across wide call-shape ranges.
// ============================================================================

//! Property-based tests for the routing-context invariants.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use proptest::prelude::*;
use split_route_core::ConnectionRole;
use split_route_core::RoutingContext;
use split_route_core::run_on_primary;

/// Runs `depth` nested routed calls, asserting the primary is active at
/// every level, and returns the total number of closure activations.
fn nest(ctx: &mut RoutingContext, depth: u32) -> u64 {
    run_on_primary(ctx, |ctx| {
        assert_eq!(ctx.active(), ConnectionRole::Primary);
        assert!(ctx.is_engaged());
        if depth == 0 {
            1
        } else {
            1 + nest(ctx, depth - 1)
        }
    })
}

proptest! {
    #[test]
    fn swap_is_balanced_for_any_nesting_depth(depth in 0_u32 .. 24) {
        let mut ctx = RoutingContext::new();
        let activations = nest(&mut ctx, depth);
        prop_assert_eq!(activations, u64::from(depth) + 1);
        prop_assert_eq!(ctx.active(), ConnectionRole::Replica);
        prop_assert!(!ctx.is_engaged());
    }

    #[test]
    fn sequential_operations_never_leak_routing_state(
        depths in prop::collection::vec(0_u32 .. 12, 1 .. 16)
    ) {
        let mut ctx = RoutingContext::new();
        for depth in depths {
            nest(&mut ctx, depth);
            prop_assert_eq!(&ctx, &RoutingContext::new());
        }
    }
}

// crates/split-route-store-sqlite/tests/reputation_store_unit.rs
// ============================================================================
// Module: Reputation Store Router Unit Tests
// Description: Targeted tests for the best-effort routing policy.
// Purpose: Validate silent degrade on primary unavailability, routed
//          mutations, table override pass-through, and defensive teardown.
// ============================================================================

//! ## Overview
//! Unit-level tests for the best-effort router invariants:
//! - Primary unavailability degrades to a no-op returning the input entry
//!   unchanged; the caller is never failed for it
//! - Mutations route to the primary and hand through the configured table
//! - Storage failures on a live primary surface as explicit results
//! - Teardown closes both handles defensively and repeats safely

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
    clippy::float_cmp,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use rusqlite::Connection;
use rusqlite::params;
use split_route_core::ConnectionRole;
use split_route_core::Identity;
use split_route_core::OpError;
use split_route_core::ReputationEntry;
use split_route_core::ReputationKey;
use split_route_core::ReputationOps;
use split_route_core::RouterEvent;
use split_route_core::RouterTelemetry;
use split_route_store_sqlite::EndpointConfig;
use split_route_store_sqlite::ReputationStoreError;
use split_route_store_sqlite::ReputationStoreRouter;
use split_route_store_sqlite::RouterConfig;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn provision_endpoint(path: &Path, marker: &str) {
    let conn = Connection::open(path).expect("open endpoint for provisioning");
    conn.execute_batch("CREATE TABLE IF NOT EXISTS endpoint_markers (label TEXT NOT NULL);")
        .expect("create schema");
    conn.execute("INSERT INTO endpoint_markers (label) VALUES (?1)", params![marker])
        .expect("insert marker row");
}

fn endpoint_label(conn: &Connection) -> String {
    conn.query_row("SELECT label FROM endpoint_markers LIMIT 1", [], |row| row.get(0))
        .expect("endpoint marker")
}

fn config_for(primary: PathBuf, replica: PathBuf, table: &str) -> RouterConfig {
    RouterConfig {
        primary: EndpointConfig {
            path: primary,
            busy_timeout_ms: 1_000,
        },
        replica: EndpointConfig {
            path: replica,
            busy_timeout_ms: 1_000,
        },
        expected_schema_version: 3,
        reputation_table: table.to_string(),
    }
}

fn sample_entry() -> ReputationEntry {
    ReputationEntry {
        key: ReputationKey {
            identity: Identity::new("alice"),
            scope: "global".to_string(),
            signer: "none".to_string(),
            address: "198.51.100.7".to_string(),
        },
        hits: 2,
        score_total: 7.5,
    }
}

/// Operation set recording the endpoint and table each call was handed.
#[derive(Clone, Default)]
struct RecordingRepOps {
    calls: Arc<Mutex<Vec<(&'static str, String, String)>>>,
    fail: Arc<Mutex<bool>>,
}

impl RecordingRepOps {
    fn set_fail(&self, fail: bool) {
        *self.fail.lock().expect("fail lock") = fail;
    }

    fn calls(&self) -> Vec<(&'static str, String, String)> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl ReputationOps for RecordingRepOps {
    type Conn = Connection;

    fn add_score(
        &self,
        conn: &Connection,
        table: &str,
        entry: &ReputationEntry,
        delta: f64,
    ) -> Result<ReputationEntry, OpError> {
        if *self.fail.lock().expect("fail lock") {
            return Err(OpError::Storage("induced failure".to_string()));
        }
        self.calls.lock().expect("calls lock").push((
            "add_score",
            endpoint_label(conn),
            table.to_string(),
        ));
        Ok(ReputationEntry {
            key: entry.key.clone(),
            hits: entry.hits + 1,
            score_total: entry.score_total + delta,
        })
    }

    fn remove_entry(
        &self,
        conn: &Connection,
        table: &str,
        _entry: &ReputationEntry,
    ) -> Result<(), OpError> {
        if *self.fail.lock().expect("fail lock") {
            return Err(OpError::Storage("induced failure".to_string()));
        }
        self.calls.lock().expect("calls lock").push((
            "remove_entry",
            endpoint_label(conn),
            table.to_string(),
        ));
        Ok(())
    }
}

/// Telemetry sink collecting events for assertions.
#[derive(Default)]
struct MemoryTelemetry {
    events: Mutex<Vec<RouterEvent>>,
}

impl MemoryTelemetry {
    fn count_matching(&self, predicate: impl Fn(&RouterEvent) -> bool) -> usize {
        self.events.lock().expect("events lock").iter().filter(|event| predicate(event)).count()
    }
}

impl RouterTelemetry for MemoryTelemetry {
    fn record(&self, event: RouterEvent) {
        self.events.lock().expect("events lock").push(event);
    }
}

fn unavailable_router(
    ops: RecordingRepOps,
    telemetry: Arc<MemoryTelemetry>,
) -> (TempDir, ReputationStoreRouter<RecordingRepOps>) {
    let temp = TempDir::new().expect("temp dir");
    let replica = temp.path().join("replica.db");
    provision_endpoint(&replica, "replica");
    let missing_primary = temp.path().join("missing").join("primary.db");
    let router = ReputationStoreRouter::new(config_for(missing_primary, replica, "reputation"), ops)
        .expect("router init")
        .with_telemetry(telemetry as Arc<dyn RouterTelemetry>);
    (temp, router)
}

fn connected_router(
    ops: RecordingRepOps,
    telemetry: Arc<MemoryTelemetry>,
    table: &str,
) -> (TempDir, ReputationStoreRouter<RecordingRepOps>) {
    let temp = TempDir::new().expect("temp dir");
    let primary = temp.path().join("primary.db");
    let replica = temp.path().join("replica.db");
    provision_endpoint(&primary, "primary");
    provision_endpoint(&replica, "replica");
    let router = ReputationStoreRouter::new(config_for(primary, replica, table), ops)
        .expect("router init")
        .with_telemetry(telemetry as Arc<dyn RouterTelemetry>);
    (temp, router)
}

// ============================================================================
// SECTION: Degrade Policy
// ============================================================================

#[test]
fn add_score_with_unavailable_primary_returns_input_unchanged() {
    let ops = RecordingRepOps::default();
    let telemetry = Arc::new(MemoryTelemetry::default());
    let (_temp, mut router) = unavailable_router(ops.clone(), Arc::clone(&telemetry));
    let entry = sample_entry();
    let returned = router.add_score(&entry, 2.5).expect("degrade is not an error");
    assert_eq!(returned, entry);
    assert!(ops.calls().is_empty());
    assert_eq!(
        telemetry.count_matching(|event| matches!(
            event,
            RouterEvent::BestEffortDegraded {
                operation: "add_score"
            }
        )),
        1
    );
}

#[test]
fn remove_entry_with_unavailable_primary_is_a_silent_noop() {
    let ops = RecordingRepOps::default();
    let telemetry = Arc::new(MemoryTelemetry::default());
    let (_temp, mut router) = unavailable_router(ops.clone(), Arc::clone(&telemetry));
    router.remove_entry(&sample_entry()).expect("degrade is not an error");
    assert!(ops.calls().is_empty());
    assert_eq!(
        telemetry.count_matching(|event| matches!(
            event,
            RouterEvent::BestEffortDegraded {
                operation: "remove_entry"
            }
        )),
        1
    );
}

#[test]
fn failed_connect_is_not_retried_but_degrades_each_call() {
    let ops = RecordingRepOps::default();
    let telemetry = Arc::new(MemoryTelemetry::default());
    let (_temp, mut router) = unavailable_router(ops, Arc::clone(&telemetry));
    let entry = sample_entry();
    let first = router.add_score(&entry, 1.0).expect("degrade");
    let second = router.add_score(&entry, 1.0).expect("degrade");
    assert_eq!(first, entry);
    assert_eq!(second, entry);
    assert_eq!(
        telemetry.count_matching(|event| matches!(event, RouterEvent::ConnectFailed { .. })),
        1
    );
    assert_eq!(
        telemetry
            .count_matching(|event| matches!(event, RouterEvent::BestEffortDegraded { .. })),
        2
    );
}

// ============================================================================
// SECTION: Routed Mutations
// ============================================================================

#[test]
fn add_score_routes_to_the_primary_and_applies_the_increment() {
    let ops = RecordingRepOps::default();
    let telemetry = Arc::new(MemoryTelemetry::default());
    let (_temp, mut router) = connected_router(ops.clone(), telemetry, "reputation");
    let entry = sample_entry();
    let updated = router.add_score(&entry, 2.5).expect("routed add_score");
    assert_eq!(updated.hits, entry.hits + 1);
    assert_eq!(updated.score_total, entry.score_total + 2.5);
    assert_eq!(
        ops.calls(),
        vec![("add_score", "primary".to_string(), "reputation".to_string())]
    );
}

#[test]
fn remove_entry_routes_to_the_primary() {
    let ops = RecordingRepOps::default();
    let telemetry = Arc::new(MemoryTelemetry::default());
    let (_temp, mut router) = connected_router(ops.clone(), telemetry, "reputation");
    router.remove_entry(&sample_entry()).expect("routed remove_entry");
    assert_eq!(
        ops.calls(),
        vec![("remove_entry", "primary".to_string(), "reputation".to_string())]
    );
}

#[test]
fn table_override_is_handed_to_the_operations() {
    let ops = RecordingRepOps::default();
    let telemetry = Arc::new(MemoryTelemetry::default());
    let (_temp, mut router) = connected_router(ops.clone(), telemetry, "custom_scores");
    assert_eq!(router.table_name(), "custom_scores");
    router.add_score(&sample_entry(), 1.0).expect("routed add_score");
    assert_eq!(
        ops.calls(),
        vec![("add_score", "primary".to_string(), "custom_scores".to_string())]
    );
}

#[test]
fn storage_errors_on_a_live_primary_surface_as_results() {
    let ops = RecordingRepOps::default();
    let telemetry = Arc::new(MemoryTelemetry::default());
    let (_temp, mut router) = connected_router(ops.clone(), Arc::clone(&telemetry), "reputation");
    ops.set_fail(true);
    let result = router.add_score(&sample_entry(), 1.0);
    assert!(matches!(result, Err(ReputationStoreError::Storage(_))));
    assert_eq!(
        telemetry.count_matching(|event| matches!(
            event,
            RouterEvent::StorageError {
                operation: "add_score",
                ..
            }
        )),
        1
    );
}

// ============================================================================
// SECTION: Teardown
// ============================================================================

#[test]
fn teardown_is_defensive_and_repeatable() {
    let ops = RecordingRepOps::default();
    let telemetry = Arc::new(MemoryTelemetry::default());
    let (_temp, mut router) = unavailable_router(ops, telemetry);
    // Teardown after a failed primary connect must still be safe, twice.
    router.add_score(&sample_entry(), 1.0).expect("degrade");
    router.teardown();
    router.teardown();
    assert!(!router.is_connected(ConnectionRole::Primary));
    assert!(!router.is_connected(ConnectionRole::Replica));
}

#[test]
fn teardown_closes_an_open_primary_and_allows_reopen() {
    let ops = RecordingRepOps::default();
    let telemetry = Arc::new(MemoryTelemetry::default());
    let (_temp, mut router) = connected_router(ops, telemetry, "reputation");
    let entry = sample_entry();
    router.add_score(&entry, 1.0).expect("routed add_score");
    assert!(router.is_connected(ConnectionRole::Primary));
    router.teardown();
    assert!(!router.is_connected(ConnectionRole::Primary));
    // The next use reopens lazily on the same session.
    let updated = router.add_score(&entry, 1.0).expect("routed add_score after reopen");
    assert_eq!(updated.hits, entry.hits + 1);
}

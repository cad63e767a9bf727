//! Contract Test: Shutdown Determinism
//!
//! This test verifies that the polling loop stops promptly and cleanly.
//!
//! Constraints verified:
//! - The loop terminates on the shutdown signal while sleeping
//! - A dropped shutdown sender also stops the loop
//! - The final state is handed back to the caller
//! - Start and stop are both reported as events
//!
//! If this test fails, someone has added:
//! - Sleeps that ignore cancellation
//! - Detached background tasks
//! - Blocking operations in the shutdown path

mod common;

use cfsync_core::{ReconcilerState, SyncEvent};
use common::*;
use std::time::Duration;
use tokio::sync::oneshot;

fn single_zone() -> InMemoryZoneApi {
    InMemoryZoneApi::new().with_zone(
        "zone-1",
        "example.com",
        vec![a_record("r1", "example.com", "1.1.1.1")],
    )
}

#[tokio::test]
async fn shutdown_signal_terminates_loop() {
    let api = single_zone();
    let source = ScriptedAddressSource::answering("ipify", "2.2.2.2");
    let (reconciler, _events) = reconciler(&api, vec![source], "example.com");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(async move { reconciler.run_with_shutdown(Some(shutdown_rx)).await });

    // Let the first cycle finish so the loop is sleeping
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(shutdown_tx.send(()).is_ok(), "loop still listening");

    let joined = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("loop stops within the timeout")
        .expect("task did not panic");
    let state = joined.expect("loop returns its state");

    assert_eq!(state.last_public_ip.as_deref(), Some("2.2.2.2"));
    assert_eq!(api.replace_calls(), 1);
}

#[tokio::test]
async fn dropped_sender_terminates_loop() {
    let api = single_zone();
    let source = ScriptedAddressSource::answering("ipify", "2.2.2.2");
    let (reconciler, _events) = reconciler(&api, vec![source], "example.com");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move { reconciler.run_with_shutdown(Some(shutdown_rx)).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(shutdown_tx);

    let result = tokio::time::timeout(Duration::from_secs(2), handle).await;
    assert!(result.is_ok(), "loop stops when the sender goes away");
}

#[tokio::test]
async fn start_and_stop_are_reported() {
    let api = single_zone();
    let source = ScriptedAddressSource::answering("ipify", "2.2.2.2");
    let (reconciler, mut events) = reconciler(&api, vec![source], "example.com");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(async move { reconciler.run_with_shutdown(Some(shutdown_rx)).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    let _ = shutdown_tx.send(());
    let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;

    let seen = drain(&mut events);
    assert_eq!(seen.first(), Some(&SyncEvent::Started { domains_count: 1 }));
    assert!(matches!(seen.last(), Some(SyncEvent::Stopped { .. })));
    assert!(seen.contains(&SyncEvent::CycleFinished {
        updated: 1,
        failed_domains: 0
    }));
}

#[tokio::test]
async fn failed_lookup_cycle_still_honors_shutdown() {
    let api = single_zone();
    let source = ScriptedAddressSource::failing("ipify");
    let (reconciler, _events) = reconciler(&api, vec![source], "example.com");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
        reconciler
            .run_from(ReconcilerState::with_address("1.1.1.1"), Some(shutdown_rx))
            .await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    let _ = shutdown_tx.send(());

    let state = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("loop stops within the timeout")
        .expect("task did not panic")
        .expect("loop returns its state");

    assert_eq!(state, ReconcilerState::with_address("1.1.1.1"));
    assert_eq!(api.find_calls(), 0);
}

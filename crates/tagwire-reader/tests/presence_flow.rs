//! Integration tests for insertion/removal flows.
//!
//! These tests drive a connected reader unit through complete presentation
//! sequences against scripted mock lines.

mod common;

use common::{TICK, connected_unit, silence};
use tagwire_core::normalize;
use tagwire_reader::PresenceState;
use tagwire_reader::mock::MockReply;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_timeout_boundary_single_tick() {
    let (mut unit, handle) = connected_unit().await;

    let start = Instant::now();
    assert!(!unit.wait_insertion(TICK).await);

    assert_eq!(start.elapsed(), TICK);
    assert_eq!(handle.probe_count(), 1);
    assert_eq!(unit.presence_state(), PresenceState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_zero_wait_polls_until_chip() {
    let (mut unit, handle) = connected_unit().await;
    handle.push_replies(silence(10));
    handle.push_reply(MockReply::ascii("305419896"));

    let start = Instant::now();
    assert!(unit.wait_insertion(std::time::Duration::ZERO).await);

    assert_eq!(start.elapsed(), TICK * 10);
    assert_eq!(handle.probe_count(), 11);
    assert_eq!(
        unit.single_chip().unwrap().identifier.to_hex(),
        "000012345678"
    );
}

#[tokio::test(start_paused = true)]
async fn test_insertion_removal_duality() {
    let (mut unit, handle) = connected_unit().await;
    handle.push_replies([
        MockReply::ascii("1000"),
        // Chip A stays in the field.
        MockReply::ascii("1000"),
        MockReply::Silence,
        MockReply::ascii("1000"),
        // Chip B replaces it.
        MockReply::ascii("2000"),
    ]);

    assert!(unit.wait_insertion(TICK * 4).await);
    let first = unit.single_chip().unwrap().identifier.clone();
    assert_eq!(first, normalize(b"1000"));

    let start = Instant::now();
    assert!(unit.wait_removal(TICK * 10).await);
    assert_eq!(start.elapsed(), TICK * 3);
    assert!(!unit.is_connected());
    assert_eq!(unit.presence_state(), PresenceState::Idle);

    let probes = handle.probe_count();
    let start = Instant::now();
    assert!(unit.wait_insertion(TICK).await);
    assert_eq!(start.elapsed(), std::time::Duration::ZERO);
    assert_eq!(handle.probe_count(), probes);
    assert_eq!(unit.single_chip().unwrap().identifier, normalize(b"2000"));
}

#[tokio::test(start_paused = true)]
async fn test_removal_times_out_while_chip_stays() {
    let (mut unit, handle) = connected_unit().await;
    handle.push_reply(MockReply::ascii("77"));
    handle.set_idle_reply(MockReply::ascii("77"));

    assert!(unit.wait_insertion(TICK).await);

    let start = Instant::now();
    assert!(!unit.wait_removal(TICK * 3).await);
    assert_eq!(start.elapsed(), TICK * 3);
    assert!(unit.is_connected());
    assert_eq!(unit.presence_state(), PresenceState::Present);
}

#[tokio::test(start_paused = true)]
async fn test_transport_errors_never_escape() {
    let (mut unit, handle) = connected_unit().await;
    handle.push_replies([
        MockReply::Error("parity".into()),
        MockReply::Error("overrun".into()),
        MockReply::ascii("9"),
    ]);

    assert!(unit.wait_insertion(TICK * 5).await);

    handle.set_idle_reply(MockReply::Error("unplugged".into()));
    assert!(!unit.wait_removal(TICK * 2).await);
    assert!(unit.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_polling_after_disconnect_times_out() {
    let (mut unit, handle) = connected_unit().await;
    unit.disconnect_from_reader().await.unwrap();
    handle.push_reply(MockReply::ascii("5"));

    assert!(!unit.wait_insertion(TICK * 2).await);
    assert_eq!(handle.probe_count(), 0);
    assert_eq!(handle.pending_replies(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_non_numeric_payload_reads_as_zero_identifier() {
    let (mut unit, handle) = connected_unit().await;
    handle.push_reply(MockReply::ascii("garbage"));

    assert!(unit.wait_insertion(TICK).await);
    assert_eq!(
        unit.single_chip().unwrap().identifier.to_hex(),
        "000000000000"
    );
}

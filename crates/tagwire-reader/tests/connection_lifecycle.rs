//! Integration tests for the connection lifecycle.
//!
//! Covers auto-detection, configuration retry and configuration-file driven
//! construction of reader units.

mod common;

use std::time::Duration;

use common::{PORT, TICK, unit_on_port};
use tagwire_reader::mock::{MockPortScanner, MockReply};
use tagwire_reader::{
    ConfigurationError, LinkState, ReaderError, ReaderSettings, ReaderUnitConfig,
    SerialReaderUnit,
};
use tokio::time::Instant;

#[tokio::test]
async fn test_auto_detect_second_of_three() {
    let mut scanner = MockPortScanner::new();
    let first = scanner.add_port("/dev/ttyS0");
    let second = scanner.add_port("/dev/ttyS1");
    let third = scanner.add_port("/dev/ttyS2");
    second.push_reply(MockReply::ascii("1"));

    let mut unit = SerialReaderUnit::new(scanner, ReaderSettings::default().auto_detect(true));
    unit.start_auto_detect().await;

    assert_eq!(unit.connected_name(), "/dev/ttyS1");
    assert!(unit.is_auto_detected());
    assert_eq!(unit.link_state(), LinkState::Closed);
    assert!(!first.is_open());
    assert!(!second.is_open());
    assert!(!third.is_open());
    assert_eq!(third.open_count(), 0);
}

#[tokio::test]
async fn test_auto_detect_disabled_leaves_port_missing() {
    let mut scanner = MockPortScanner::new();
    let only = scanner.add_port("/dev/ttyS0");
    only.push_reply(MockReply::ascii("1"));

    let mut unit = SerialReaderUnit::new(scanner, ReaderSettings::default());
    let result = unit.connect_to_reader().await;

    assert!(matches!(result, Err(ReaderError::MissingPort { .. })));
    assert_eq!(only.open_count(), 0);
}

#[tokio::test]
async fn test_auto_detect_finds_nothing() {
    let mut scanner = MockPortScanner::new();
    scanner.add_port("/dev/ttyS0");

    let mut unit = SerialReaderUnit::new(scanner, ReaderSettings::default().auto_detect(true));
    let result = unit.connect_to_reader().await;

    assert!(matches!(result, Err(ReaderError::MissingPort { .. })));
    assert_eq!(unit.link_state(), LinkState::Unconfigured);
}

#[tokio::test(start_paused = true)]
async fn test_configuration_retry_after_backoff() {
    let (mut unit, handle) = unit_on_port();
    *unit.settings_mut() = ReaderSettings::default().configuration_retry(true, TICK);
    handle.fail_next_settings(1);

    let start = Instant::now();
    assert!(unit.connect_to_reader().await.unwrap());

    assert_eq!(start.elapsed(), TICK);
    assert_eq!(handle.open_count(), 2);
    assert_eq!(handle.close_count(), 1);
    assert_eq!(unit.link_state(), LinkState::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_second_configuration_failure_propagates() {
    let (mut unit, handle) = unit_on_port();
    *unit.settings_mut() = ReaderSettings::default().configuration_retry(true, TICK);
    handle.fail_next_settings(2);

    let result = unit.connect_to_reader().await;

    assert!(matches!(
        result,
        Err(ReaderError::Configuration(ConfigurationError::Rejected { .. }))
    ));
    assert_eq!(handle.settings_attempts(), 2);
    assert!(!handle.is_open());
}

#[tokio::test]
async fn test_connect_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("ReaderUnit.config"),
        format!("[config]\ncard_type = \"EM4102\"\nport = \"{PORT}\"\n"),
    )
    .unwrap();

    let config = ReaderUnitConfig::load_or_default(dir.path());
    let mut scanner = MockPortScanner::new();
    let handle = scanner.add_port(PORT);
    handle.push_reply(MockReply::ascii("12"));

    let mut unit = SerialReaderUnit::from_config(scanner, ReaderSettings::default(), &config);
    unit.connect_to_reader().await.unwrap();

    assert!(unit.wait_insertion(Duration::from_millis(500)).await);
    assert_eq!(unit.single_chip().unwrap().card_type, "EM4102");
    assert_eq!(unit.name(), PORT);
}

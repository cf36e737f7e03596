//! Common test utilities for integration tests.
//!
//! Builds reader units on top of mock scanners so flows can be scripted
//! reply by reply. Time is driven by the paused tokio clock, so every
//! assertion on elapsed time is exact.

#![allow(dead_code)]

use std::time::Duration;

use tagwire_reader::mock::{MockLineHandle, MockPortScanner, MockReply};
use tagwire_reader::{ReaderSettings, SerialReaderUnit};

/// Port name used by single-port tests.
pub const PORT: &str = "/dev/ttyMOCK0";

/// One poll tick.
pub const TICK: Duration = Duration::from_millis(500);

pub type MockUnit = SerialReaderUnit<MockPortScanner>;

/// Unit bound to [`PORT`] with default settings, not connected.
pub fn unit_on_port() -> (MockUnit, MockLineHandle) {
    let mut scanner = MockPortScanner::new();
    let handle = scanner.add_port(PORT);
    let mut unit = SerialReaderUnit::new(scanner, ReaderSettings::default());
    unit.set_port_name(PORT);
    (unit, handle)
}

/// Connected unit bound to [`PORT`].
pub async fn connected_unit() -> (MockUnit, MockLineHandle) {
    let (mut unit, handle) = unit_on_port();
    unit.connect_to_reader()
        .await
        .expect("mock connect should succeed");
    (unit, handle)
}

/// Script `n` silent cycles.
pub fn silence(n: usize) -> impl Iterator<Item = MockReply> {
    std::iter::repeat_n(MockReply::Silence, n)
}

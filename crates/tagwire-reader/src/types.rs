//! Common types shared by the reader components.
//!
//! This module defines the line parameters applied to a serial endpoint and
//! the observable states of the connection lifecycle and the presence poller.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tagwire_core::constants::{DEFAULT_BAUD_RATE, DEFAULT_LINE_READ_TIMEOUT_MS};
use tokio_serial::{DataBits, FlowControl, Parity, StopBits};

/// Line parameters applied to a serial endpoint.
///
/// The defaults describe the reader's fixed framing: 9600 baud, 8N1, no
/// flow control, raw mode, 500 ms read timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSettings {
    /// Baud rate in bits per second.
    pub baud_rate: u32,

    /// Character size.
    pub data_bits: DataBits,

    /// Parity checking.
    pub parity: Parity,

    /// Number of stop bits.
    pub stop_bits: StopBits,

    /// Software/hardware flow control.
    pub flow_control: FlowControl,

    /// Read timeout of the line itself.
    pub read_timeout: Duration,
}

impl Default for LineSettings {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            read_timeout: Duration::from_millis(DEFAULT_LINE_READ_TIMEOUT_MS),
        }
    }
}

impl LineSettings {
    /// Set the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the read timeout.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }
}

/// Connection lifecycle state of a reader unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// No endpoint selected yet.
    Unconfigured,

    /// Auto-detection is scanning candidate ports.
    Detecting,

    /// Endpoint selected, line closed.
    Closed,

    /// Line open, settings not applied yet.
    Open,

    /// Line open and configured.
    Ready,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_str = match self {
            LinkState::Unconfigured => "Unconfigured",
            LinkState::Detecting => "Detecting",
            LinkState::Closed => "Closed",
            LinkState::Open => "Open",
            LinkState::Ready => "Ready",
        };
        write!(f, "{}", state_str)
    }
}

/// State of the presence poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceState {
    /// No poll running and nothing present.
    Idle,

    /// Insertion loop running.
    AwaitingInsertion,

    /// A chip is present.
    Present,

    /// Removal loop running while a chip is present.
    AwaitingRemoval,
}

impl fmt::Display for PresenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_str = match self {
            PresenceState::Idle => "Idle",
            PresenceState::AwaitingInsertion => "AwaitingInsertion",
            PresenceState::Present => "Present",
            PresenceState::AwaitingRemoval => "AwaitingRemoval",
        };
        write!(f, "{}", state_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_line_settings_are_9600_8n1() {
        let settings = LineSettings::default();
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.data_bits, DataBits::Eight);
        assert_eq!(settings.parity, Parity::None);
        assert_eq!(settings.stop_bits, StopBits::One);
        assert_eq!(settings.flow_control, FlowControl::None);
        assert_eq!(settings.read_timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_line_settings_builder() {
        let settings = LineSettings::default()
            .with_baud_rate(19200)
            .with_read_timeout(Duration::from_millis(100));
        assert_eq!(settings.baud_rate, 19200);
        assert_eq!(settings.read_timeout, Duration::from_millis(100));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(LinkState::Ready.to_string(), "Ready");
        assert_eq!(PresenceState::AwaitingRemoval.to_string(), "AwaitingRemoval");
    }
}

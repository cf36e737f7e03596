//! Protocol-level constants for broadcast-only serial tag readers.
//!
//! The reader this workspace drives has no request/response protocol. It
//! emits the decimal identifier of a presented tag over a 9600 8N1 line and
//! ignores everything written to it. These constants pin down the timing and
//! framing assumptions the poller and the line configurator rely on.
//!
//! # Usage
//!
//! ```
//! use tagwire_core::constants::*;
//! use std::time::Duration;
//!
//! let tick = Duration::from_millis(POLL_TICK_MS);
//! assert_eq!(tick.as_millis(), 500);
//! assert_eq!(DEFAULT_BAUD_RATE, 9600);
//! ```

// ============================================================================
// Polling
// ============================================================================

/// Interval between two probes of a poll loop, in milliseconds.
///
/// The elapsed-time accounting of the insertion and removal loops advances
/// by exactly this amount per cycle, independent of how long the read took.
pub const POLL_TICK_MS: u64 = 500;

/// Content-free byte written to the line to trigger a read cycle.
///
/// The device never interprets it.
pub const PROBE_COMMAND: &[u8] = &[0xFF];

// ============================================================================
// Identifiers
// ============================================================================

/// Minimum number of hex digits of a normalized identifier.
///
/// A zero-padded 12 digit rendering yields a 6 byte identifier.
pub const IDENTIFIER_HEX_WIDTH: usize = 12;

/// Card type label meaning "not configured".
pub const UNKNOWN_CARD_TYPE: &str = "UNKNOWN";

/// Card type used for chips when no label was configured.
pub const GENERIC_CARD_TYPE: &str = "GenericTag";

// ============================================================================
// Line settings
// ============================================================================

/// Baud rate of the reader line.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Read timeout applied to the line (VTIME = 5 deciseconds).
pub const DEFAULT_LINE_READ_TIMEOUT_MS: u64 = 500;

/// Quiet gap that terminates a frame once the first byte has arrived.
pub const FRAME_GAP_MS: u64 = 50;

// ============================================================================
// Settings defaults
// ============================================================================

/// Default time allowed for a candidate port to answer during auto-detection.
pub const DEFAULT_AUTO_DETECTION_TIMEOUT_MS: u64 = 400;

/// Default backoff before the single configuration retry.
pub const DEFAULT_CONFIGURATION_RETRY_TIMEOUT_MS: u64 = 500;

/// Name of the optional configuration file read from the working directory.
pub const CONFIG_FILE_NAME: &str = "ReaderUnit.config";

//! Collaborator trait definitions.
//!
//! The reader core only consumes these interfaces: the serial transport
//! ([`SerialLine`]), host port enumeration ([`PortScanner`]) and chip
//! materialization ([`ChipFactory`]). Real implementations live in
//! [`serial`](crate::serial) and [`factory`](crate::factory), in-memory ones
//! in [`mock`](crate::mock).
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024 RPITIT),
//! eliminating the need for the `async_trait` macro.

#![allow(async_fn_in_trait)]

use std::time::Duration;

use tagwire_core::{Chip, ChipIdentifier};

use crate::error::Result;
use crate::types::LineSettings;

/// Serial transport abstraction.
///
/// A line is identified by its device name and may be opened and closed any
/// number of times. The reader never interprets what it writes; `read`
/// returns whatever the device emitted within the timeout.
///
/// # Object Safety and Dynamic Dispatch
///
/// This trait is NOT object-safe because `async fn` methods return
/// `impl Future`. Use generic parameters, or the enum wrapper
/// [`AnySerialLine`](crate::devices::AnySerialLine) for runtime selection.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use tagwire_reader::traits::SerialLine;
/// use tagwire_reader::Result;
///
/// async fn sniff<L: SerialLine>(line: &mut L) -> Result<Vec<u8>> {
///     line.open().await?;
///     let data = line.read(Duration::from_millis(500)).await;
///     line.close().await?;
///     data
/// }
/// ```
pub trait SerialLine: Send {
    /// Device name (e.g. `/dev/ttyUSB0`, `COM3`). May be empty.
    fn device_name(&self) -> &str;

    /// Whether the line is currently open.
    fn is_open(&self) -> bool;

    /// Open the line.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be opened.
    async fn open(&mut self) -> Result<()>;

    /// Close the line. Closing a closed line is a no-op.
    async fn close(&mut self) -> Result<()>;

    /// Close and open the line again.
    async fn reopen(&mut self) -> Result<()> {
        self.close().await?;
        self.open().await
    }

    /// Settings currently applied to the line, if any.
    fn settings(&self) -> Option<LineSettings>;

    /// Apply line settings.
    ///
    /// This is the single place where platform-specific framing lives.
    ///
    /// # Errors
    ///
    /// Returns an error if the line is closed or the platform rejects the
    /// settings.
    fn apply_settings(&mut self, settings: &LineSettings) -> Result<()>;

    /// Write bytes to the line.
    async fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Read one frame, waiting at most `timeout` for the first byte.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::Timeout`](crate::ReaderError::Timeout) when
    /// nothing arrives in time, or a transport error.
    async fn read(&mut self, timeout: Duration) -> Result<Vec<u8>>;
}

/// Host serial port enumeration.
pub trait PortScanner: Send + Sync {
    /// Line type produced by this scanner.
    type Line: SerialLine;

    /// Names of the serial ports visible to the host, in enumeration order.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform enumeration fails.
    fn available_ports(&self) -> Result<Vec<String>>;

    /// Create a closed line for the named port.
    fn line_for(&self, device_name: &str) -> Self::Line;
}

/// Materializes a presented credential once its identifier is known.
pub trait ChipFactory: Send + Sync {
    /// Create a chip of the given card type with the given identifier.
    fn create_chip(&self, card_type: &str, identifier: ChipIdentifier) -> Chip;
}

//! Enum wrappers for transport dispatch.
//!
//! Native `async fn` in traits are not object-safe, so `Box<dyn SerialLine>`
//! is not an option. These enums pick the transport at runtime (hardware or
//! simulation) while the reader unit stays generic over one concrete type.
//!
//! # Examples
//!
//! ```
//! use tagwire_reader::devices::AnyPortScanner;
//! use tagwire_reader::mock::MockPortScanner;
//! use tagwire_reader::traits::{PortScanner, SerialLine};
//!
//! let mut mock = MockPortScanner::new();
//! mock.add_port("/dev/ttyMOCK0");
//!
//! let scanner = AnyPortScanner::Mock(mock);
//! let line = scanner.line_for("/dev/ttyMOCK0");
//! assert_eq!(line.device_name(), "/dev/ttyMOCK0");
//! ```

use std::time::Duration;

use crate::Result;
use crate::mock::{MockPortScanner, MockSerialLine};
use crate::serial::{NativePortScanner, NativeSerialLine};
use crate::traits::{PortScanner, SerialLine};
use crate::types::LineSettings;

/// Enum wrapper for serial line dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnySerialLine {
    /// Host serial port.
    Native(NativeSerialLine),

    /// Scripted line for development and testing.
    Mock(MockSerialLine),
}

impl SerialLine for AnySerialLine {
    fn device_name(&self) -> &str {
        match self {
            Self::Native(line) => line.device_name(),
            Self::Mock(line) => line.device_name(),
        }
    }

    fn is_open(&self) -> bool {
        match self {
            Self::Native(line) => line.is_open(),
            Self::Mock(line) => line.is_open(),
        }
    }

    async fn open(&mut self) -> Result<()> {
        match self {
            Self::Native(line) => line.open().await,
            Self::Mock(line) => line.open().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            Self::Native(line) => line.close().await,
            Self::Mock(line) => line.close().await,
        }
    }

    fn settings(&self) -> Option<LineSettings> {
        match self {
            Self::Native(line) => line.settings(),
            Self::Mock(line) => line.settings(),
        }
    }

    fn apply_settings(&mut self, settings: &LineSettings) -> Result<()> {
        match self {
            Self::Native(line) => line.apply_settings(settings),
            Self::Mock(line) => line.apply_settings(settings),
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Self::Native(line) => line.write(data).await,
            Self::Mock(line) => line.write(data).await,
        }
    }

    async fn read(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        match self {
            Self::Native(line) => line.read(timeout).await,
            Self::Mock(line) => line.read(timeout).await,
        }
    }
}

/// Enum wrapper for port enumeration dispatch.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AnyPortScanner {
    /// Host serial ports.
    Native(NativePortScanner),

    /// Registered mock ports.
    Mock(MockPortScanner),
}

impl PortScanner for AnyPortScanner {
    type Line = AnySerialLine;

    fn available_ports(&self) -> Result<Vec<String>> {
        match self {
            Self::Native(scanner) => scanner.available_ports(),
            Self::Mock(scanner) => scanner.available_ports(),
        }
    }

    fn line_for(&self, device_name: &str) -> Self::Line {
        match self {
            Self::Native(scanner) => AnySerialLine::Native(scanner.line_for(device_name)),
            Self::Mock(scanner) => AnySerialLine::Mock(scanner.line_for(device_name)),
        }
    }
}

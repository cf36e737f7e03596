//! Presence detection for broadcast-only serial tag readers.
//!
//! The reader this crate drives has no command set: it emits the identifier
//! of whatever tag sits in its field as decimal ASCII when poked, and nothing
//! else. This crate rebuilds the usual reader semantics on top of that:
//!
//! - **Connection lifecycle**: port auto-detection, open, line
//!   configuration with a single bounded retry ([`SerialReaderUnit`]).
//! - **Presence**: insertion and removal waits built from a 500 ms probe
//!   loop ([`poller`]).
//! - **Identifiers**: normalization of the decimal payload to a fixed-width
//!   binary identifier ([`tagwire_core::normalize`]).
//!
//! # Transports
//!
//! The [`SerialLine`] and [`PortScanner`] traits separate the protocol from
//! the wire. [`serial`] implements them on host serial ports through
//! `tokio-serial`, [`mock`] on scripted in-memory lines, and [`devices`]
//! wraps both for runtime selection.
//!
//! ```no_run
//! use std::time::Duration;
//! use tagwire_reader::serial::NativePortScanner;
//! use tagwire_reader::{ReaderSettings, SerialReaderUnit};
//!
//! #[tokio::main]
//! async fn main() -> tagwire_reader::Result<()> {
//!     let settings = ReaderSettings::from_env().auto_detect(true);
//!     let mut unit = SerialReaderUnit::new(NativePortScanner, settings);
//!     unit.connect_to_reader().await?;
//!
//!     loop {
//!         if unit.wait_insertion(Duration::ZERO).await {
//!             println!("{}", unit.single_chip().map(ToString::to_string).unwrap_or_default());
//!             unit.wait_removal(Duration::ZERO).await;
//!         }
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! Lifecycle operations return [`Result<T>`][error::Result] with
//! [`ReaderError`]. Transport failures during polling never escape: a failed
//! cycle counts as "no data".
//!
//! [`SerialLine`]: traits::SerialLine
//! [`PortScanner`]: traits::PortScanner

pub mod configurator;
pub mod detector;
pub mod devices;
pub mod error;
pub mod factory;
pub mod mock;
pub mod poller;
pub mod serial;
pub mod settings;
pub mod traits;
pub mod types;
pub mod unit;

// Re-export commonly used types for convenience
pub use configurator::{ConfigureRetry, configure};
pub use detector::{AutoDetector, DetectedPort};
pub use devices::{AnyPortScanner, AnySerialLine};
pub use error::{ConfigurationError, ReaderError, Result};
pub use factory::GenericChipFactory;
pub use poller::{CycleOutcome, PollOptions, PollScope, PresencePoller};
pub use settings::{LogPolicy, PollKind, ReaderSettings, ReaderUnitConfig};
pub use traits::{ChipFactory, PortScanner, SerialLine};
pub use types::{LineSettings, LinkState, PresenceState};
pub use unit::SerialReaderUnit;

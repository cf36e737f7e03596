//! Serial reader unit.
//!
//! Owns the endpoint of one reader and drives its lifecycle:
//!
//! ```text
//! Unconfigured ──auto-detect──► Detecting ──found──► Closed
//!      │                            │
//!      │ set_serial_port            └──none──► Unconfigured
//!      ▼
//!   Closed ──open──► Open ──configure──► Ready
//!      ▲                                   │
//!      └────────── disconnect ─────────────┘
//! ```
//!
//! Presence polling is delegated to [`PresencePoller`]; the unit lends it the
//! endpoint for the duration of each wait.

use std::time::Duration;

use tagwire_core::Chip;
use tagwire_core::constants::UNKNOWN_CARD_TYPE;
use tracing::{debug, info, warn};

use crate::configurator::configure;
use crate::detector::AutoDetector;
use crate::error::{ReaderError, Result};
use crate::factory::GenericChipFactory;
use crate::poller::{PollOptions, PollScope, PresencePoller};
use crate::settings::{PollKind, ReaderSettings, ReaderUnitConfig};
use crate::traits::{ChipFactory, PortScanner, SerialLine};
use crate::types::{LinkState, PresenceState};

/// One reader attached to a serial port.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tagwire_reader::mock::{MockPortScanner, MockReply};
/// use tagwire_reader::{ReaderSettings, SerialReaderUnit};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> tagwire_reader::Result<()> {
///     let mut scanner = MockPortScanner::new();
///     let handle = scanner.add_port("/dev/ttyMOCK0");
///     handle.push_reply(MockReply::ascii("255"));
///
///     let mut unit = SerialReaderUnit::new(scanner, ReaderSettings::default());
///     unit.set_port_name("/dev/ttyMOCK0");
///     unit.connect_to_reader().await?;
///
///     assert!(unit.wait_insertion(Duration::from_millis(500)).await);
///     assert_eq!(unit.single_chip().unwrap().identifier.to_hex(), "0000000000ff");
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct SerialReaderUnit<S: PortScanner, F: ChipFactory = GenericChipFactory> {
    scanner: S,
    factory: F,
    settings: ReaderSettings,
    endpoint: Option<S::Line>,
    card_type: String,
    auto_detected: bool,
    link_state: LinkState,
    poller: PresencePoller,
}

impl<S: PortScanner> SerialReaderUnit<S> {
    /// Create a unit without endpoint using the generic chip factory.
    pub fn new(scanner: S, settings: ReaderSettings) -> Self {
        Self::with_factory(scanner, GenericChipFactory, settings)
    }

    /// Create a unit from a configuration file's contents.
    ///
    /// An empty port name leaves the endpoint unset, so the first connect
    /// runs auto-detection when enabled.
    pub fn from_config(scanner: S, settings: ReaderSettings, config: &ReaderUnitConfig) -> Self {
        let mut unit = Self::new(scanner, settings);
        unit.set_card_type(config.card_type.clone());
        if !config.port.is_empty() {
            unit.set_port_name(&config.port);
        }
        unit
    }
}

impl<S: PortScanner, F: ChipFactory> SerialReaderUnit<S, F> {
    pub fn with_factory(scanner: S, factory: F, settings: ReaderSettings) -> Self {
        Self {
            scanner,
            factory,
            settings,
            endpoint: None,
            card_type: UNKNOWN_CARD_TYPE.to_string(),
            auto_detected: false,
            link_state: LinkState::Unconfigured,
            poller: PresencePoller::new(),
        }
    }

    /// Use the named port as endpoint.
    ///
    /// Returns the previous endpoint, which the caller should close if it is
    /// still open.
    pub fn set_port_name(&mut self, device_name: &str) -> Option<S::Line> {
        let line = self.scanner.line_for(device_name);
        self.set_serial_port(line)
    }

    /// Inject an endpoint. Returns the previous one.
    pub fn set_serial_port(&mut self, line: S::Line) -> Option<S::Line> {
        debug!("Serial port set to {:?}", line.device_name());
        self.link_state = if line.is_open() {
            LinkState::Open
        } else {
            LinkState::Closed
        };
        self.auto_detected = false;
        self.endpoint.replace(line)
    }

    pub fn serial_port(&self) -> Option<&S::Line> {
        self.endpoint.as_ref()
    }

    /// Configured port name; empty when the port was auto-detected.
    pub fn name(&self) -> &str {
        if self.auto_detected {
            return "";
        }
        self.connected_name()
    }

    /// Name of the endpoint in use, auto-detected or not.
    pub fn connected_name(&self) -> &str {
        self.endpoint
            .as_ref()
            .map(SerialLine::device_name)
            .unwrap_or_default()
    }

    pub fn card_type(&self) -> &str {
        &self.card_type
    }

    pub fn set_card_type(&mut self, card_type: impl Into<String>) {
        self.card_type = card_type.into();
    }

    pub fn settings(&self) -> &ReaderSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut ReaderSettings {
        &mut self.settings
    }

    pub fn scanner(&self) -> &S {
        &self.scanner
    }

    pub fn is_auto_detected(&self) -> bool {
        self.auto_detected
    }

    pub fn link_state(&self) -> LinkState {
        self.link_state
    }

    pub fn presence_state(&self) -> PresenceState {
        self.poller.state()
    }

    /// Whether a chip is currently present.
    pub fn is_connected(&self) -> bool {
        self.poller.is_present()
    }

    pub fn single_chip(&self) -> Option<&Chip> {
        self.poller.inserted_chip()
    }

    pub fn chip_list(&self) -> Vec<Chip> {
        self.poller.inserted_chip().cloned().into_iter().collect()
    }

    /// The reader has no command to report its serial number.
    pub fn reader_serial_number(&self) -> String {
        warn!("Reader serial number is not available on this device");
        String::new()
    }

    /// Chip-level connect. The device has no session concept.
    pub fn connect(&mut self) -> bool {
        debug!("Chip connect is a no-op for this reader");
        true
    }

    /// Chip-level disconnect. The device has no session concept.
    pub fn disconnect(&mut self) {
        debug!("Chip disconnect is a no-op for this reader");
    }

    /// Scan for the reader when no port name is configured.
    ///
    /// Does nothing when a port is configured or auto-detection is disabled.
    /// Finding nothing is not an error; [`Self::connect_to_reader`] reports
    /// the missing port.
    pub async fn start_auto_detect(&mut self) {
        let unnamed = self
            .endpoint
            .as_ref()
            .is_none_or(|line| line.device_name().is_empty());
        if !unnamed {
            return;
        }

        if !self.settings.auto_detect {
            info!("Serial port auto-detection disabled through reader settings");
            return;
        }

        info!("Starting serial port auto-detection");
        self.link_state = LinkState::Detecting;

        let detector = AutoDetector::new(self.settings.auto_detection_timeout, self.settings.line);
        match detector.detect(&self.scanner).await {
            Some(found) => {
                info!("Auto-detected reader on {}", found.line.device_name());
                self.endpoint = Some(found.line);
                self.auto_detected = true;
                self.link_state = LinkState::Closed;
            }
            None => {
                self.link_state = LinkState::Unconfigured;
            }
        }
    }

    /// Open and configure the reader's port.
    ///
    /// Returns `Ok(true)` without touching the line when it is already open.
    ///
    /// # Errors
    ///
    /// - [`ReaderError::MissingPort`] when no named endpoint exists after
    ///   auto-detection
    /// - transport errors from opening the line
    /// - [`ReaderError::Configuration`] when the line settings are rejected;
    ///   the line is closed again in that case
    pub async fn connect_to_reader(&mut self) -> Result<bool> {
        info!("Connecting to reader...");
        self.start_auto_detect().await;

        let line = match self.endpoint.as_mut() {
            Some(line) if !line.device_name().is_empty() => line,
            Some(_) => {
                return Err(ReaderError::missing_port(
                    "serial port name is empty and auto-detection found nothing",
                ));
            }
            None => return Err(ReaderError::missing_port("no serial port configured")),
        };

        if line.is_open() {
            debug!("{} already open", line.device_name());
            return Ok(true);
        }

        line.open().await?;
        self.link_state = LinkState::Open;

        if let Err(e) = configure(Some(&mut *line), &self.settings.line, self.settings.retry_policy()).await {
            warn!("Configuring {} failed: {}", line.device_name(), e);
            if let Err(close_err) = line.close().await {
                warn!("Closing {} failed: {}", line.device_name(), close_err);
            }
            self.link_state = LinkState::Closed;
            return Err(e);
        }

        self.link_state = LinkState::Ready;
        info!("Connected to reader on {}", line.device_name());
        Ok(true)
    }

    /// Close the reader's port if it is open.
    pub async fn disconnect_from_reader(&mut self) -> Result<()> {
        let Some(line) = self.endpoint.as_mut() else {
            return Ok(());
        };

        if line.is_open() {
            info!("Disconnecting from reader on {}", line.device_name());
            line.close().await?;
        }
        self.link_state = LinkState::Closed;
        Ok(())
    }

    /// Wait for a chip to be presented; zero waits forever.
    pub async fn wait_insertion(&mut self, max_wait: Duration) -> bool {
        let options = self.poll_options(PollKind::Insertion, max_wait);
        self.poller
            .wait_insertion(self.endpoint.as_mut(), &self.factory, &self.card_type, options)
            .await
    }

    /// Wait for the present chip to be replaced; zero waits forever.
    pub async fn wait_removal(&mut self, max_wait: Duration) -> bool {
        let options = self.poll_options(PollKind::Removal, max_wait);
        self.poller.wait_removal(self.endpoint.as_mut(), options).await
    }

    fn poll_options(&self, kind: PollKind, max_wait: Duration) -> PollOptions {
        let scope = PollScope::new(self.settings.log.poll_verbose(kind));
        PollOptions::new(max_wait, self.settings.line.read_timeout).with_scope(scope)
    }
}

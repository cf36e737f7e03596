//! Auto-detection of the port the reader is attached to.
//!
//! The reader cannot be identified by a query, so detection only proves that
//! something on a port emits data after a probe. Candidates are tried in the
//! order the host enumerates them and the first one that answers wins.

use std::time::Duration;

use tagwire_core::constants::PROBE_COMMAND;
use tracing::{error, info, warn};

use crate::configurator::{ConfigureRetry, configure};
use crate::error::{ReaderError, Result};
use crate::traits::{PortScanner, SerialLine};
use crate::types::LineSettings;

/// Outcome of probing one candidate port.
#[derive(Debug)]
pub struct DetectedPort<L> {
    /// Candidate line, always returned closed.
    pub line: L,

    /// Whether the candidate answered the probe.
    pub confirmed: bool,
}

/// Scans candidate ports for a responsive reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoDetector {
    /// Time a candidate has to answer the probe.
    pub timeout: Duration,

    /// Settings applied to each candidate before probing.
    pub line_settings: LineSettings,
}

impl AutoDetector {
    pub fn new(timeout: Duration, line_settings: LineSettings) -> Self {
        Self {
            timeout,
            line_settings,
        }
    }

    /// Probe every port of `scanner` and return the first responsive one.
    ///
    /// Returns `None` when enumeration fails, no port exists or none answers.
    /// That is a degraded state, not an error: the connect step reports the
    /// missing port.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use tagwire_reader::detector::AutoDetector;
    /// use tagwire_reader::mock::{MockPortScanner, MockReply};
    /// use tagwire_reader::traits::SerialLine;
    /// use tagwire_reader::LineSettings;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let mut scanner = MockPortScanner::new();
    ///     scanner.add_port("/dev/ttyS0");
    ///     scanner.add_port("/dev/ttyUSB0").push_reply(MockReply::ascii("42"));
    ///
    ///     let detector = AutoDetector::new(Duration::from_millis(400), LineSettings::default());
    ///     let found = detector.detect(&scanner).await.unwrap();
    ///     assert_eq!(found.line.device_name(), "/dev/ttyUSB0");
    /// }
    /// ```
    pub async fn detect<S: PortScanner>(&self, scanner: &S) -> Option<DetectedPort<S::Line>> {
        let ports = match scanner.available_ports() {
            Ok(ports) => ports,
            Err(e) => {
                warn!("Serial port enumeration failed: {}", e);
                Vec::new()
            }
        };

        if ports.is_empty() {
            warn!("No serial port detected");
            return None;
        }

        for name in ports {
            info!("Probing port {}", name);
            let candidate = self.probe(scanner.line_for(&name)).await;
            if candidate.confirmed {
                info!("Reader found on {}", name);
                return Some(candidate);
            }
        }

        info!("No reader found on any serial port");
        None
    }

    /// Open, configure and probe one candidate, closing it afterwards.
    pub async fn probe<L: SerialLine>(&self, mut line: L) -> DetectedPort<L> {
        let confirmed = match self.try_probe(&mut line).await {
            Ok(reply) => !reply.is_empty(),
            Err(e) => {
                error!("Probing {} failed: {}", line.device_name(), e);
                false
            }
        };

        if line.is_open()
            && let Err(e) = line.close().await
        {
            warn!("Closing {} failed: {}", line.device_name(), e);
        }

        DetectedPort { line, confirmed }
    }

    async fn try_probe<L: SerialLine>(&self, line: &mut L) -> Result<Vec<u8>> {
        line.open().await?;
        configure(Some(&mut *line), &self.line_settings, ConfigureRetry::Never).await?;
        line.write(PROBE_COMMAND).await?;

        let reply = line.read(self.timeout).await?;
        if reply.is_empty() {
            return Err(ReaderError::communication("empty reply to probe"));
        }
        Ok(reply)
    }
}

//! Native serial transport backed by `tokio-serial`.
//!
//! Provides async serial I/O with the reader and host port enumeration.
//!
//! # Framing
//!
//! While a tag is presented the reader keeps emitting its identifier,
//! usually terminated by `\r\n`. A read therefore returns one frame, not
//! everything on the wire:
//!
//! - reading stops at the first frame bounded by terminators on both sides,
//!   after a [`FRAME_GAP_MS`] quiet gap, or at the read deadline, whichever
//!   comes first;
//! - when several frames were received the newest complete one wins.

use std::time::Duration;

use tagwire_core::constants::FRAME_GAP_MS;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{Instant, timeout_at};
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::{debug, error, trace, warn};

use crate::error::{ReaderError, Result};
use crate::traits::{PortScanner, SerialLine};
use crate::types::LineSettings;

/// Size of the buffer used for a single read call.
const READ_CHUNK: usize = 64;

/// Upper bound of bytes collected by one read.
const MAX_RECEIVED: usize = 256;

fn is_terminator(byte: u8) -> bool {
    matches!(byte, b'\r' | b'\n')
}

/// Newest frame received with terminators on both sides.
fn bounded_frame(received: &[u8]) -> Option<&[u8]> {
    let segments: Vec<&[u8]> = received.split(|b| is_terminator(*b)).collect();
    let inner = segments.get(1..segments.len().saturating_sub(1))?;
    inner.iter().rev().find(|segment| !segment.is_empty()).copied()
}

/// Newest terminated frame, or the unterminated remainder when there is none.
fn newest_frame(received: &[u8]) -> &[u8] {
    let mut segments: Vec<&[u8]> = received.split(|b| is_terminator(*b)).collect();
    let tail = segments.pop().unwrap_or_default();
    segments
        .into_iter()
        .rev()
        .find(|segment| !segment.is_empty())
        .unwrap_or(tail)
}

/// Serial line on a host device.
pub struct NativeSerialLine {
    device_name: String,
    stream: Option<SerialStream>,
    settings: Option<LineSettings>,
}

impl NativeSerialLine {
    /// Create a closed line for the given device.
    ///
    /// # Arguments
    /// * `device_name` - Path to the serial device (e.g., "/dev/ttyUSB0")
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            stream: None,
            settings: None,
        }
    }

    /// Wrap an already open stream.
    pub fn from_stream(device_name: impl Into<String>, stream: SerialStream) -> Self {
        Self {
            device_name: device_name.into(),
            stream: Some(stream),
            settings: None,
        }
    }

    fn stream_mut(&mut self) -> Result<&mut SerialStream> {
        let device = &self.device_name;
        self.stream
            .as_mut()
            .ok_or_else(|| ReaderError::disconnected(device.clone()))
    }
}

impl std::fmt::Debug for NativeSerialLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeSerialLine")
            .field("device_name", &self.device_name)
            .field("open", &self.stream.is_some())
            .field("settings", &self.settings)
            .finish()
    }
}

impl SerialLine for NativeSerialLine {
    fn device_name(&self) -> &str {
        &self.device_name
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    async fn open(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        debug!("Opening serial port: {}", self.device_name);
        let defaults = LineSettings::default();
        let stream = tokio_serial::new(&self.device_name, defaults.baud_rate)
            .timeout(defaults.read_timeout)
            .open_native_async()
            .map_err(|e| {
                error!("Failed to open serial port {}: {}", self.device_name, e);
                ReaderError::Serial(e)
            })?;

        self.stream = Some(stream);
        self.settings = None;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.stream.take().is_some() {
            debug!("Closed serial port: {}", self.device_name);
        }
        self.settings = None;
        Ok(())
    }

    fn settings(&self) -> Option<LineSettings> {
        self.settings
    }

    fn apply_settings(&mut self, settings: &LineSettings) -> Result<()> {
        let stream = self.stream_mut()?;

        stream.set_baud_rate(settings.baud_rate)?;
        stream.set_data_bits(settings.data_bits)?;
        stream.set_parity(settings.parity)?;
        stream.set_stop_bits(settings.stop_bits)?;
        stream.set_flow_control(settings.flow_control)?;
        stream.set_timeout(settings.read_timeout)?;

        // Unix ports are opened raw by the serialport layer; on Windows the
        // modem control lines must be dropped explicitly.
        #[cfg(windows)]
        {
            stream.write_data_terminal_ready(false)?;
            stream.write_request_to_send(false)?;
        }

        self.settings = Some(*settings);
        Ok(())
    }

    /// Input received since the last read is discarded first, so the reply
    /// read next belongs to this write.
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream_mut()?;
        stream.clear(ClearBuffer::Input)?;
        stream.write_all(data).await?;
        stream.flush().await?;
        trace!("TX: {:?}", data);
        Ok(())
    }

    async fn read(&mut self, wait: Duration) -> Result<Vec<u8>> {
        let deadline = Instant::now() + wait;
        let gap = Duration::from_millis(FRAME_GAP_MS);
        let stream = self.stream_mut()?;
        let mut buf = [0u8; READ_CHUNK];
        let mut received = Vec::new();

        loop {
            let limit = if received.is_empty() {
                deadline
            } else {
                (Instant::now() + gap).min(deadline)
            };

            match timeout_at(limit, stream.read(&mut buf)).await {
                Err(_) if received.is_empty() => {
                    return Err(ReaderError::timeout(wait.as_millis() as u64));
                }
                Err(_) => break,
                Ok(Ok(0)) if received.is_empty() => {
                    warn!("Serial port returned EOF - device may have been disconnected");
                    return Err(ReaderError::disconnected("EOF on serial port"));
                }
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    received.extend_from_slice(&buf[..n]);
                    if received.len() >= MAX_RECEIVED || bounded_frame(&received).is_some() {
                        break;
                    }
                }
                Ok(Err(e)) => return Err(e.into()),
            }
        }

        trace!("RX: {:?}", received);
        Ok(newest_frame(&received).to_vec())
    }
}

/// Enumerates the serial ports of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativePortScanner;

impl PortScanner for NativePortScanner {
    type Line = NativeSerialLine;

    fn available_ports(&self) -> Result<Vec<String>> {
        let ports = tokio_serial::available_ports().map_err(|e| {
            error!("Failed to enumerate serial ports: {}", e);
            ReaderError::Serial(e)
        })?;

        Ok(ports.into_iter().map(|port| port.port_name).collect())
    }

    fn line_for(&self, device_name: &str) -> Self::Line {
        NativeSerialLine::new(device_name)
    }
}

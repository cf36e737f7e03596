//! Mock serial line for testing and development.
//!
//! This module provides a simulated serial line whose replies can be
//! scripted programmatically, plus a scanner that serves such lines, so the
//! poller, the configurator and auto-detection can be exercised without a
//! physical reader.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::{ReaderError, Result};
use crate::traits::{PortScanner, SerialLine};
use crate::types::LineSettings;

/// One scripted answer to a read call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// The device emitted these bytes.
    Data(Vec<u8>),

    /// A read that returned without any byte.
    Empty,

    /// Nothing arrived before the read timeout.
    Silence,

    /// The transport failed with this message.
    Error(String),
}

impl MockReply {
    /// Reply with an ASCII payload, as the reader would emit it.
    pub fn ascii(payload: &str) -> Self {
        Self::Data(payload.as_bytes().to_vec())
    }
}

#[derive(Debug)]
struct MockLineState {
    device_name: String,
    open: bool,
    settings: Option<LineSettings>,
    replies: VecDeque<MockReply>,
    idle_reply: MockReply,
    failing_settings: u32,
    fail_open: bool,
    open_count: u32,
    close_count: u32,
    settings_attempts: u32,
    settings_applied: u32,
    read_count: u32,
    written: Vec<Vec<u8>>,
}

impl MockLineState {
    fn new(device_name: String) -> Self {
        Self {
            device_name,
            open: false,
            settings: None,
            replies: VecDeque::new(),
            idle_reply: MockReply::Silence,
            failing_settings: 0,
            fail_open: false,
            open_count: 0,
            close_count: 0,
            settings_attempts: 0,
            settings_applied: 0,
            read_count: 0,
            written: Vec::new(),
        }
    }
}

type SharedState = Arc<Mutex<MockLineState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, MockLineState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock serial line.
///
/// Reads pop scripted replies in order; once the script is exhausted every
/// read returns the idle reply ([`MockReply::Silence`] unless changed).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tagwire_reader::mock::{MockReply, MockSerialLine};
/// use tagwire_reader::traits::SerialLine;
///
/// #[tokio::main]
/// async fn main() -> tagwire_reader::Result<()> {
///     let (mut line, handle) = MockSerialLine::new("/dev/ttyMOCK0");
///     handle.push_reply(MockReply::ascii("255"));
///
///     line.open().await?;
///     let data = line.read(Duration::from_millis(500)).await?;
///     assert_eq!(data, b"255");
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockSerialLine {
    state: SharedState,
    device_name: String,
}

impl MockSerialLine {
    /// Create a mock line and the handle controlling it.
    pub fn new(device_name: impl Into<String>) -> (Self, MockLineHandle) {
        let device_name = device_name.into();
        let state = Arc::new(Mutex::new(MockLineState::new(device_name.clone())));

        let line = Self {
            state: Arc::clone(&state),
            device_name,
        };
        (line, MockLineHandle { state })
    }

    fn from_handle(handle: &MockLineHandle) -> Self {
        let device_name = lock(&handle.state).device_name.clone();
        Self {
            state: Arc::clone(&handle.state),
            device_name,
        }
    }
}

impl SerialLine for MockSerialLine {
    fn device_name(&self) -> &str {
        &self.device_name
    }

    fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    async fn open(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_open {
            return Err(ReaderError::disconnected(state.device_name.clone()));
        }
        state.open = true;
        state.open_count += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        if state.open {
            state.open = false;
            state.close_count += 1;
        }
        state.settings = None;
        Ok(())
    }

    fn settings(&self) -> Option<LineSettings> {
        lock(&self.state).settings
    }

    fn apply_settings(&mut self, settings: &LineSettings) -> Result<()> {
        let mut state = lock(&self.state);
        state.settings_attempts += 1;

        if !state.open {
            return Err(ReaderError::disconnected(state.device_name.clone()));
        }
        if state.failing_settings > 0 {
            state.failing_settings -= 1;
            return Err(ReaderError::rejected(
                state.device_name.clone(),
                "settings rejected by mock",
            ));
        }

        state.settings = Some(*settings);
        state.settings_applied += 1;
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut state = lock(&self.state);
        if !state.open {
            return Err(ReaderError::disconnected(state.device_name.clone()));
        }
        state.written.push(data.to_vec());
        Ok(())
    }

    async fn read(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        let mut state = lock(&self.state);
        if !state.open {
            return Err(ReaderError::disconnected(state.device_name.clone()));
        }
        state.read_count += 1;

        let reply = match state.replies.pop_front() {
            Some(reply) => reply,
            None => state.idle_reply.clone(),
        };

        match reply {
            MockReply::Data(data) => Ok(data),
            MockReply::Empty => Ok(Vec::new()),
            MockReply::Silence => Err(ReaderError::timeout(timeout.as_millis() as u64)),
            MockReply::Error(message) => Err(ReaderError::communication(message)),
        }
    }
}

/// Handle for scripting and inspecting a mock serial line.
///
/// Clones share the same line.
#[derive(Debug, Clone)]
pub struct MockLineHandle {
    state: SharedState,
}

impl MockLineHandle {
    /// Queue a reply for the next read.
    pub fn push_reply(&self, reply: MockReply) {
        lock(&self.state).replies.push_back(reply);
    }

    /// Queue several replies.
    pub fn push_replies(&self, replies: impl IntoIterator<Item = MockReply>) {
        lock(&self.state).replies.extend(replies);
    }

    /// Reply used once the script is exhausted.
    pub fn set_idle_reply(&self, reply: MockReply) {
        lock(&self.state).idle_reply = reply;
    }

    /// Make the next `count` settings applications fail.
    pub fn fail_next_settings(&self, count: u32) {
        lock(&self.state).failing_settings = count;
    }

    /// Make every open attempt fail.
    pub fn fail_open(&self, fail: bool) {
        lock(&self.state).fail_open = fail;
    }

    pub fn device_name(&self) -> String {
        lock(&self.state).device_name.clone()
    }

    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    pub fn settings(&self) -> Option<LineSettings> {
        lock(&self.state).settings
    }

    pub fn open_count(&self) -> u32 {
        lock(&self.state).open_count
    }

    pub fn close_count(&self) -> u32 {
        lock(&self.state).close_count
    }

    /// Number of `apply_settings` calls, successful or not.
    pub fn settings_attempts(&self) -> u32 {
        lock(&self.state).settings_attempts
    }

    /// Number of successful `apply_settings` calls.
    pub fn settings_applied(&self) -> u32 {
        lock(&self.state).settings_applied
    }

    /// Number of writes, i.e. probes sent.
    pub fn probe_count(&self) -> usize {
        lock(&self.state).written.len()
    }

    pub fn read_count(&self) -> u32 {
        lock(&self.state).read_count
    }

    /// Everything written to the line, one entry per write.
    pub fn written(&self) -> Vec<Vec<u8>> {
        lock(&self.state).written.clone()
    }

    /// Number of scripted replies not consumed yet.
    pub fn pending_replies(&self) -> usize {
        lock(&self.state).replies.len()
    }
}

/// Scanner serving mock lines in registration order.
///
/// # Examples
///
/// ```
/// use tagwire_reader::mock::MockPortScanner;
/// use tagwire_reader::traits::PortScanner;
///
/// let mut scanner = MockPortScanner::new();
/// let _first = scanner.add_port("/dev/ttyMOCK0");
/// let _second = scanner.add_port("/dev/ttyMOCK1");
///
/// assert_eq!(
///     scanner.available_ports().unwrap(),
///     vec!["/dev/ttyMOCK0", "/dev/ttyMOCK1"]
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockPortScanner {
    ports: Vec<MockLineHandle>,
    fail_enumeration: bool,
}

impl MockPortScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a port and return the handle controlling its line.
    pub fn add_port(&mut self, device_name: impl Into<String>) -> MockLineHandle {
        let (_, handle) = MockSerialLine::new(device_name);
        self.ports.push(handle.clone());
        handle
    }

    /// Handle of a registered port.
    pub fn handle(&self, device_name: &str) -> Option<MockLineHandle> {
        self.ports
            .iter()
            .find(|handle| handle.device_name() == device_name)
            .cloned()
    }

    /// Make enumeration fail.
    pub fn fail_enumeration(&mut self, fail: bool) {
        self.fail_enumeration = fail;
    }
}

impl PortScanner for MockPortScanner {
    type Line = MockSerialLine;

    fn available_ports(&self) -> Result<Vec<String>> {
        if self.fail_enumeration {
            return Err(ReaderError::communication("port enumeration failed"));
        }
        Ok(self.ports.iter().map(MockLineHandle::device_name).collect())
    }

    fn line_for(&self, device_name: &str) -> Self::Line {
        match self.handle(device_name) {
            Some(handle) => MockSerialLine::from_handle(&handle),
            None => MockSerialLine::new(device_name).0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_millis(500);

    #[tokio::test]
    async fn test_scripted_replies_then_idle() {
        let (mut line, handle) = MockSerialLine::new("/dev/ttyMOCK0");
        handle.push_replies([MockReply::ascii("12"), MockReply::Empty]);
        line.open().await.unwrap();

        assert_eq!(line.read(WAIT).await.unwrap(), b"12");
        assert!(line.read(WAIT).await.unwrap().is_empty());
        assert!(matches!(
            line.read(WAIT).await,
            Err(ReaderError::Timeout { duration_ms: 500 })
        ));
        assert_eq!(handle.read_count(), 3);
    }

    #[tokio::test]
    async fn test_read_on_closed_line_fails() {
        let (mut line, handle) = MockSerialLine::new("/dev/ttyMOCK0");
        handle.push_reply(MockReply::ascii("12"));

        assert!(matches!(
            line.read(WAIT).await,
            Err(ReaderError::Disconnected { .. })
        ));
        assert_eq!(handle.pending_replies(), 1);
    }

    #[tokio::test]
    async fn test_error_reply() {
        let (mut line, handle) = MockSerialLine::new("/dev/ttyMOCK0");
        handle.push_reply(MockReply::Error("framing".into()));
        line.open().await.unwrap();

        assert!(matches!(
            line.read(WAIT).await,
            Err(ReaderError::Communication { .. })
        ));
    }

    #[tokio::test]
    async fn test_failing_settings_then_success() {
        let (mut line, handle) = MockSerialLine::new("/dev/ttyMOCK0");
        handle.fail_next_settings(1);
        line.open().await.unwrap();

        assert!(line.apply_settings(&LineSettings::default()).is_err());
        assert!(line.apply_settings(&LineSettings::default()).is_ok());
        assert_eq!(handle.settings_attempts(), 2);
        assert_eq!(handle.settings_applied(), 1);
        assert_eq!(line.settings(), Some(LineSettings::default()));
    }

    #[tokio::test]
    async fn test_open_close_counters_and_reopen() {
        let (mut line, handle) = MockSerialLine::new("/dev/ttyMOCK0");
        line.open().await.unwrap();
        line.reopen().await.unwrap();
        line.close().await.unwrap();
        line.close().await.unwrap();

        assert_eq!(handle.open_count(), 2);
        assert_eq!(handle.close_count(), 2);
        assert!(!handle.is_open());
    }

    #[tokio::test]
    async fn test_fail_open() {
        let (mut line, handle) = MockSerialLine::new("/dev/ttyMOCK0");
        handle.fail_open(true);
        assert!(line.open().await.is_err());
        assert!(!line.is_open());
    }

    #[tokio::test]
    async fn test_scanner_lines_share_state() {
        let mut scanner = MockPortScanner::new();
        let handle = scanner.add_port("/dev/ttyMOCK0");

        let mut line = scanner.line_for("/dev/ttyMOCK0");
        line.open().await.unwrap();
        line.write(&[0xFF]).await.unwrap();

        assert!(handle.is_open());
        assert_eq!(handle.written(), vec![vec![0xFF]]);
    }

    #[test]
    fn test_scanner_unknown_port_and_failure() {
        let mut scanner = MockPortScanner::new();
        let line = scanner.line_for("/dev/ttyNONE");
        assert_eq!(line.device_name(), "/dev/ttyNONE");

        scanner.fail_enumeration(true);
        assert!(scanner.available_ports().is_err());
    }
}

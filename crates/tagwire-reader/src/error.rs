//! Error types for reader operations.
//!
//! Only structural misconfiguration surfaces from the connect path. Transport
//! failures seen while polling are folded into per-cycle outcomes by the
//! poller and never reach the caller.

/// Result type alias for reader operations.
pub type Result<T> = std::result::Result<T, ReaderError>;

/// Failures of the line configurator.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// No endpoint was supplied.
    #[error("No serial port configured")]
    NoPort,

    /// The endpoint has an empty device name.
    #[error("Serial port name is empty, auto-detection failed")]
    EmptyName,

    /// The platform rejected the line settings.
    #[error("Line settings rejected on {device}: {message}")]
    Rejected { device: String, message: String },
}

/// Errors that can occur during reader operations.
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    /// Line configuration failed.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// No usable port after auto-detection.
    #[error("Missing serial port: {reason}")]
    MissingPort { reason: String },

    /// Line is not open or has been disconnected.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Read timed out.
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Device communication error.
    #[error("Communication error: {message}")]
    Communication { message: String },

    /// Serial port error from the platform layer.
    #[error("Serial error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration source could not be parsed.
    #[error("Config error: {0}")]
    Config(String),
}

impl ReaderError {
    /// Create a new missing port error.
    pub fn missing_port(reason: impl Into<String>) -> Self {
        Self::MissingPort {
            reason: reason.into(),
        }
    }

    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::Communication {
            message: message.into(),
        }
    }

    /// Create a new rejected-settings error.
    pub fn rejected(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration(ConfigurationError::Rejected {
            device: device.into(),
            message: message.into(),
        })
    }

    /// Whether this error is a transport-level failure (read, write, timeout).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Disconnected { .. }
                | Self::Timeout { .. }
                | Self::Communication { .. }
                | Self::Serial(_)
                | Self::Io(_)
        )
    }
}

//! Reader settings and the optional configuration file.
//!
//! Settings are built with a priority chain: defaults, then environment
//! overrides. The card type label and an optional port name come from a
//! small TOML document (`ReaderUnit.config` in the working directory):
//!
//! ```toml
//! [config]
//! card_type = "EM4102"
//! port = "/dev/ttyUSB0"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tagwire_core::constants::{
    CONFIG_FILE_NAME, DEFAULT_AUTO_DETECTION_TIMEOUT_MS, DEFAULT_CONFIGURATION_RETRY_TIMEOUT_MS,
    UNKNOWN_CARD_TYPE,
};
use tracing::{debug, warn};

use crate::configurator::ConfigureRetry;
use crate::error::{ReaderError, Result};
use crate::types::LineSettings;

/// Environment variable enabling auto-detection.
pub const ENV_AUTO_DETECT: &str = "TAGWIRE_AUTO_DETECT";
/// Environment variable overriding the detection timeout (ms).
pub const ENV_AUTO_DETECT_TIMEOUT_MS: &str = "TAGWIRE_AUTO_DETECT_TIMEOUT_MS";
/// Environment variable enabling the configuration retry.
pub const ENV_CONFIG_RETRY: &str = "TAGWIRE_CONFIG_RETRY";
/// Environment variable overriding the configuration retry backoff (ms).
pub const ENV_CONFIG_RETRY_TIMEOUT_MS: &str = "TAGWIRE_CONFIG_RETRY_TIMEOUT_MS";
/// Environment variable enabling logs inside insertion loops.
pub const ENV_LOG_INSERTION_POLLS: &str = "TAGWIRE_LOG_INSERTION_POLLS";
/// Environment variable enabling logs inside removal loops.
pub const ENV_LOG_REMOVAL_POLLS: &str = "TAGWIRE_LOG_REMOVAL_POLLS";

/// Which poll loop a log scope is derived for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollKind {
    Insertion,
    Removal,
}

/// Logging policy of a reader unit.
///
/// Poll loops run at 2 Hz and would flood the log, so they are quiet unless
/// explicitly enabled per loop kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPolicy {
    /// Master switch for reader logs.
    pub enabled: bool,

    /// Log from inside insertion loops.
    pub show_insertion_polls: bool,

    /// Log from inside removal loops.
    pub show_removal_polls: bool,
}

impl Default for LogPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            show_insertion_polls: false,
            show_removal_polls: false,
        }
    }
}

impl LogPolicy {
    /// Whether a poll loop of the given kind may log.
    pub fn poll_verbose(&self, kind: PollKind) -> bool {
        self.enabled
            && match kind {
                PollKind::Insertion => self.show_insertion_polls,
                PollKind::Removal => self.show_removal_polls,
            }
    }
}

/// Externally injected reader settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderSettings {
    /// Scan ports when no port name is configured.
    pub auto_detect: bool,

    /// Time a candidate port has to answer during auto-detection.
    pub auto_detection_timeout: Duration,

    /// Retry line configuration once after reopening the port.
    pub configuration_retry: bool,

    /// Backoff before the configuration retry.
    pub configuration_retry_timeout: Duration,

    /// Line parameters.
    pub line: LineSettings,

    /// Logging policy.
    pub log: LogPolicy,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            auto_detect: false,
            auto_detection_timeout: Duration::from_millis(DEFAULT_AUTO_DETECTION_TIMEOUT_MS),
            configuration_retry: false,
            configuration_retry_timeout: Duration::from_millis(
                DEFAULT_CONFIGURATION_RETRY_TIMEOUT_MS,
            ),
            line: LineSettings::default(),
            log: LogPolicy::default(),
        }
    }
}

impl ReaderSettings {
    /// Defaults with overrides from the process environment.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a key lookup (environment or test map).
    ///
    /// Unparseable values are ignored with a warning.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup(ENV_AUTO_DETECT).and_then(|v| parse_flag(ENV_AUTO_DETECT, &v))
        {
            self.auto_detect = value;
        }
        if let Some(value) = lookup(ENV_AUTO_DETECT_TIMEOUT_MS)
            .and_then(|v| parse_millis(ENV_AUTO_DETECT_TIMEOUT_MS, &v))
        {
            self.auto_detection_timeout = value;
        }
        if let Some(value) =
            lookup(ENV_CONFIG_RETRY).and_then(|v| parse_flag(ENV_CONFIG_RETRY, &v))
        {
            self.configuration_retry = value;
        }
        if let Some(value) = lookup(ENV_CONFIG_RETRY_TIMEOUT_MS)
            .and_then(|v| parse_millis(ENV_CONFIG_RETRY_TIMEOUT_MS, &v))
        {
            self.configuration_retry_timeout = value;
        }
        if let Some(value) =
            lookup(ENV_LOG_INSERTION_POLLS).and_then(|v| parse_flag(ENV_LOG_INSERTION_POLLS, &v))
        {
            self.log.show_insertion_polls = value;
        }
        if let Some(value) =
            lookup(ENV_LOG_REMOVAL_POLLS).and_then(|v| parse_flag(ENV_LOG_REMOVAL_POLLS, &v))
        {
            self.log.show_removal_polls = value;
        }
        self
    }

    /// Enable or disable auto-detection.
    pub fn auto_detect(mut self, enabled: bool) -> Self {
        self.auto_detect = enabled;
        self
    }

    /// Enable the configuration retry with the given backoff.
    pub fn configuration_retry(mut self, enabled: bool, backoff: Duration) -> Self {
        self.configuration_retry = enabled;
        self.configuration_retry_timeout = backoff;
        self
    }

    /// Retry policy for the connect path.
    pub fn retry_policy(&self) -> ConfigureRetry {
        ConfigureRetry::from_flag(self.configuration_retry, self.configuration_retry_timeout)
    }
}

fn parse_flag(key: &str, value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => {
            warn!("Ignoring {}={:?}: not a boolean", key, other);
            None
        }
    }
}

fn parse_millis(key: &str, value: &str) -> Option<Duration> {
    match value.trim().parse::<u64>() {
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a number of milliseconds", key, value);
            None
        }
    }
}

fn unknown_card_type() -> String {
    UNKNOWN_CARD_TYPE.to_string()
}

/// Contents of the reader configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderUnitConfig {
    /// Card type label used when creating chips.
    #[serde(default = "unknown_card_type")]
    pub card_type: String,

    /// Serial port name; empty means auto-detect.
    #[serde(default)]
    pub port: String,
}

impl Default for ReaderUnitConfig {
    fn default() -> Self {
        Self {
            card_type: unknown_card_type(),
            port: String::new(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    config: ReaderUnitConfig,
}

impl ReaderUnitConfig {
    /// Parse from a TOML document with a `[config]` table.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<ConfigDocument>(content)
            .map(|doc| doc.config)
            .map_err(|e| ReaderError::Config(e.to_string()))
    }

    /// Serialize to a TOML document with a `[config]` table.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(&ConfigDocument {
            config: self.clone(),
        })
        .map_err(|e| ReaderError::Config(e.to_string()))
    }

    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load `ReaderUnit.config` from `dir`, falling back to defaults when the
    /// file is missing or invalid.
    pub fn load_or_default(dir: &Path) -> Self {
        let path = dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            debug!("No reader configuration at {}", path.display());
            return Self::default();
        }

        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring reader configuration {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load `ReaderUnit.config` from the current working directory.
    pub fn from_working_dir() -> Self {
        match std::env::current_dir() {
            Ok(dir) => Self::load_or_default(&dir),
            Err(e) => {
                warn!("Cannot resolve working directory: {}", e);
                Self::default()
            }
        }
    }
}

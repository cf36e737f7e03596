//! Line configuration with a bounded retry.
//!
//! Some USB-serial adapters reject the first settings change after being
//! opened. Waiting, reopening the port and trying again once is enough for
//! them, so [`configure`] supports exactly one retry and never recurses
//! further.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{ConfigurationError, ReaderError, Result};
use crate::traits::SerialLine;
use crate::types::LineSettings;

/// Retry policy for [`configure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureRetry {
    /// Fail on the first rejection.
    Never,

    /// Sleep `backoff`, reopen the line and try once more.
    Once { backoff: Duration },
}

impl ConfigureRetry {
    /// Build the policy from an enable flag and a backoff.
    pub fn from_flag(enabled: bool, backoff: Duration) -> Self {
        if enabled {
            Self::Once { backoff }
        } else {
            Self::Never
        }
    }
}

/// Apply `settings` to an endpoint.
///
/// # Errors
///
/// - [`ConfigurationError::NoPort`] when `endpoint` is `None`
/// - [`ConfigurationError::EmptyName`] when the endpoint has no device name
/// - [`ConfigurationError::Rejected`] when the settings are rejected and the
///   retry (if any) fails as well
/// - any transport error raised while reopening the line
///
/// # Examples
///
/// ```
/// use tagwire_reader::configurator::{configure, ConfigureRetry};
/// use tagwire_reader::mock::MockSerialLine;
/// use tagwire_reader::traits::SerialLine;
/// use tagwire_reader::LineSettings;
///
/// #[tokio::main]
/// async fn main() -> tagwire_reader::Result<()> {
///     let (mut line, handle) = MockSerialLine::new("/dev/ttyMOCK0");
///     line.open().await?;
///
///     configure(Some(&mut line), &LineSettings::default(), ConfigureRetry::Never).await?;
///     assert_eq!(handle.settings(), Some(LineSettings::default()));
///     Ok(())
/// }
/// ```
pub async fn configure<L: SerialLine>(
    endpoint: Option<&mut L>,
    settings: &LineSettings,
    retry: ConfigureRetry,
) -> Result<()> {
    let line = endpoint.ok_or(ConfigurationError::NoPort)?;
    if line.device_name().is_empty() {
        return Err(ConfigurationError::EmptyName.into());
    }

    match line.apply_settings(settings) {
        Ok(()) => {
            debug!(
                "Configured {} at {} baud",
                line.device_name(),
                settings.baud_rate
            );
            Ok(())
        }
        Err(e) => match retry {
            ConfigureRetry::Once { backoff } => {
                warn!(
                    "Configuring {} failed ({}), sleeping {}ms then reopening and retrying",
                    line.device_name(),
                    e,
                    backoff.as_millis()
                );
                tokio::time::sleep(backoff).await;
                line.reopen().await?;
                Box::pin(configure(Some(line), settings, ConfigureRetry::Never)).await
            }
            ConfigureRetry::Never => Err(into_rejected(line.device_name(), e)),
        },
    }
}

fn into_rejected(device: &str, error: ReaderError) -> ReaderError {
    match error {
        ReaderError::Configuration(_) => error,
        other => ReaderError::rejected(device, other.to_string()),
    }
}

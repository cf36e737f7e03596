//! Mock transport implementations for testing and development.
//!
//! This module provides simulated serial lines and a port scanner that can be
//! controlled programmatically without requiring physical hardware.

pub mod line;

// Re-export commonly used types
pub use line::{MockLineHandle, MockPortScanner, MockReply, MockSerialLine};

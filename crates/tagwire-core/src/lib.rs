pub mod constants;
pub mod error;
pub mod identifier;
pub mod types;

pub use error::{Error, Result};
pub use identifier::normalize;
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    // Identifier errors
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
}

pub type Result<T> = std::result::Result<T, Error>;

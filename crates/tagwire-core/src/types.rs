use crate::{
    Result,
    constants::{GENERIC_CARD_TYPE, UNKNOWN_CARD_TYPE},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Chip identifier bytes, one byte per hex digit pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChipIdentifier(Vec<u8>);

impl ChipIdentifier {
    /// Wrap raw identifier bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Parse an identifier from a hex string.
    ///
    /// # Errors
    /// Returns `Error::InvalidIdentifier` if the string has an odd length or
    /// contains a non-hex character.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagwire_core::ChipIdentifier;
    ///
    /// let id = ChipIdentifier::from_hex("0000000000ff").unwrap();
    /// assert_eq!(id.as_bytes(), &[0, 0, 0, 0, 0, 0xff]);
    /// assert!(ChipIdentifier::from_hex("abc").is_err());
    /// ```
    pub fn from_hex(hex: &str) -> Result<Self> {
        if hex.len() % 2 != 0 {
            return Err(Error::InvalidIdentifier(format!(
                "Hex identifier must have an even length, got {}",
                hex.len()
            )));
        }

        hex.as_bytes()
            .chunks(2)
            .map(|pair| {
                std::str::from_utf8(pair)
                    .ok()
                    .and_then(|s| u8::from_str_radix(s, 16).ok())
                    .ok_or_else(|| Error::InvalidIdentifier(format!("Invalid hex digits in {hex}")))
            })
            .collect::<Result<Vec<u8>>>()
            .map(Self)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Lowercase hex rendering.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for ChipIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for ChipIdentifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ChipIdentifier::from_hex(s)
    }
}

impl From<Vec<u8>> for ChipIdentifier {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Map a configured card type label to the label used for chip creation.
///
/// The `UNKNOWN` sentinel and an empty label both fall back to the generic
/// tag type.
///
/// # Examples
///
/// ```
/// use tagwire_core::effective_card_type;
///
/// assert_eq!(effective_card_type("UNKNOWN"), "GenericTag");
/// assert_eq!(effective_card_type("EM4102"), "EM4102");
/// ```
#[must_use]
pub fn effective_card_type(label: &str) -> &str {
    if label.is_empty() || label == UNKNOWN_CARD_TYPE {
        GENERIC_CARD_TYPE
    } else {
        label
    }
}

/// A credential materialized from an identifier read on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chip {
    /// Card type label the chip was created with.
    pub card_type: String,

    /// Normalized identifier.
    pub identifier: ChipIdentifier,

    /// Card provider attached at creation, if any.
    pub card_provider: Option<String>,
}

impl Chip {
    pub fn new(card_type: impl Into<String>, identifier: ChipIdentifier) -> Self {
        Self {
            card_type: card_type.into(),
            identifier,
            card_provider: None,
        }
    }

    /// Attach a card provider label.
    pub fn with_card_provider(mut self, provider: impl Into<String>) -> Self {
        self.card_provider = Some(provider.into());
        self
    }

    #[must_use]
    pub fn identifier(&self) -> &ChipIdentifier {
        &self.identifier
    }
}

impl fmt::Display for Chip {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} [{}]", self.card_type, self.identifier)
    }
}

//! Default chip factory.

use tagwire_core::constants::GENERIC_CARD_TYPE;
use tagwire_core::{Chip, ChipIdentifier};
use tracing::trace;

use crate::traits::ChipFactory;

/// Creates chips for any card type label.
///
/// Generic tags get the generic card provider attached; other labels are
/// returned bare, leaving provider resolution to whoever registered them.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericChipFactory;

impl ChipFactory for GenericChipFactory {
    fn create_chip(&self, card_type: &str, identifier: ChipIdentifier) -> Chip {
        trace!("Creating chip of type {} for {}", card_type, identifier);
        let chip = Chip::new(card_type, identifier);

        if card_type == GENERIC_CARD_TYPE {
            trace!("Generic tag chip created");
            chip.with_card_provider(GENERIC_CARD_TYPE)
        } else {
            chip
        }
    }
}

//! Normalization of raw reader payloads into chip identifiers.
//!
//! The reader emits the tag number as ASCII decimal digits. The rest of the
//! system works with hex byte identifiers, so every payload goes through
//! [`normalize`]: decimal to `u64`, `u64` to zero-padded lowercase hex, hex
//! pairs to bytes.
//!
//! Parsing is lossy: a payload without leading digits becomes the all-zero
//! identifier instead of an error, so line noise reads as a chip.

use crate::ChipIdentifier;
use crate::constants::IDENTIFIER_HEX_WIDTH;

/// Normalize a raw serial payload into a chip identifier.
///
/// Empty input yields an empty identifier, meaning "nothing presented".
///
/// # Examples
///
/// ```
/// use tagwire_core::normalize;
///
/// assert!(normalize(b"").is_empty());
/// assert_eq!(normalize(b"255").to_hex(), "0000000000ff");
/// assert_eq!(normalize(b"noise").to_hex(), "000000000000");
/// ```
pub fn normalize(raw: &[u8]) -> ChipIdentifier {
    if raw.is_empty() {
        return ChipIdentifier::default();
    }

    let value = parse_decimal_prefix(raw);
    let mut hex = format!("{value:0width$x}", width = IDENTIFIER_HEX_WIDTH);
    if hex.len() % 2 != 0 {
        hex.insert(0, '0');
    }

    let bytes = hex
        .as_bytes()
        .chunks(2)
        .map(|pair| (nibble(pair[0]) << 4) | nibble(pair[1]))
        .collect();

    ChipIdentifier::new(bytes)
}

/// Parse the leading decimal digits of a payload the way `strtoull` does:
/// leading whitespace and a `+` sign are skipped, parsing stops at the first
/// non-digit, and overflow saturates.
fn parse_decimal_prefix(raw: &[u8]) -> u64 {
    let mut digits = raw.iter().skip_while(|b| b.is_ascii_whitespace()).peekable();
    if digits.peek() == Some(&&b'+') {
        digits.next();
    }

    digits
        .take_while(|b| b.is_ascii_digit())
        .fold(0u64, |acc, b| {
            acc.saturating_mul(10).saturating_add(u64::from(b - b'0'))
        })
}

fn nibble(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_empty_payload_is_empty_identifier() {
        assert!(normalize(b"").is_empty());
    }

    #[test]
    fn test_zero_is_six_zero_bytes() {
        assert_eq!(normalize(b"0").as_bytes(), &[0u8; 6]);
    }

    #[rstest]
    #[case(b"255".as_slice(), "0000000000ff")]
    #[case(b"1".as_slice(), "000000000001")]
    #[case(b"4294967295".as_slice(), "0000ffffffff")]
    #[case(b"281474976710655".as_slice(), "ffffffffffff")]
    fn test_decimal_to_hex(#[case] raw: &[u8], #[case] expected: &str) {
        assert_eq!(normalize(raw).to_hex(), expected);
    }

    #[rstest]
    #[case(b"abc".as_slice())]
    #[case(b"\x02\x03".as_slice())]
    #[case(b"-12".as_slice())]
    fn test_non_numeric_is_all_zero(#[case] raw: &[u8]) {
        // Garbage is not rejected.
        assert_eq!(normalize(raw).as_bytes(), &[0u8; 6]);
    }

    #[rstest]
    #[case(b"  42\r\n".as_slice(), "00000000002a")]
    #[case(b"+42".as_slice(), "00000000002a")]
    #[case(b"42abc".as_slice(), "00000000002a")]
    fn test_prefix_parsing(#[case] raw: &[u8], #[case] expected: &str) {
        assert_eq!(normalize(raw).to_hex(), expected);
    }

    #[test]
    fn test_wide_value_is_byte_aligned() {
        // 2^48 needs 13 hex digits.
        let id = normalize(b"281474976710656");
        assert_eq!(id.to_hex(), "01000000000000");
        assert_eq!(id.len(), 7);
    }

    #[test]
    fn test_overflow_saturates() {
        let id = normalize(b"99999999999999999999999");
        assert_eq!(id.to_hex(), "ffffffffffffffff");
    }

    #[test]
    fn test_same_input_same_identifier() {
        assert_eq!(normalize(b"123456"), normalize(b"123456\r\n"));
        assert_ne!(normalize(b"123456"), normalize(b"123457"));
    }
}

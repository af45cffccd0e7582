//! Primitive wire elements.
//!
//! The protocol has two kinds of field:
//!
//! ```text
//! size field (fixed 16 bytes, ASCII decimal, space padded on the right):
//! +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+
//! | 1 | 2 | 3 | 4 | 5 |   |   |   |   |   |   |   |   |   |   |   |
//! +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+
//!
//! token (raw UTF-8, no length prefix, read with one bounded receive):
//! +------------------------+
//! | e.g. "split" / "a.pdf" |
//! +------------------------+
//! ```
//!
//! Tokens rely on the lock-step ACK discipline for their boundaries: a token
//! is never followed by another write until the peer has acknowledged it.

use crate::error::ProtocolError;
use crate::SIZE_FIELD_LEN;
use bytes::Bytes;

/// Encodes `n` as a 16-byte size field.
pub fn encode_size(n: u64) -> Result<[u8; SIZE_FIELD_LEN], ProtocolError> {
    let digits = n.to_string();
    if digits.len() > SIZE_FIELD_LEN {
        return Err(ProtocolError::SizeOverflow(n));
    }

    let mut field = [b' '; SIZE_FIELD_LEN];
    field[..digits.len()].copy_from_slice(digits.as_bytes());
    Ok(field)
}

/// Decodes a size field.
///
/// Accepts either padding style (spaces or zeros, before or after the
/// digits) and trailing NULs, but the field itself must be exactly 16 bytes.
pub fn decode_size(field: &[u8]) -> Result<u64, ProtocolError> {
    let lossy = String::from_utf8_lossy(field);
    if field.len() != SIZE_FIELD_LEN {
        return Err(ProtocolError::MalformedSize(lossy.into_owned()));
    }

    let trimmed = lossy.trim_matches(|c: char| c.is_ascii_whitespace() || c == '\0');
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProtocolError::MalformedSize(lossy.into_owned()));
    }

    trimmed
        .parse()
        .map_err(|_| ProtocolError::MalformedSize(lossy.into_owned()))
}

/// Encodes a token as its raw UTF-8 bytes.
pub fn encode_token(token: &str) -> Bytes {
    Bytes::copy_from_slice(token.as_bytes())
}

/// Decodes a received token.
pub fn decode_token(bytes: &[u8]) -> Result<String, ProtocolError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| ProtocolError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_size_layout() {
        let field = encode_size(12345).unwrap();
        assert_eq!(&field, b"12345           ");
        assert_eq!(field.len(), SIZE_FIELD_LEN);
    }

    #[test]
    fn test_encode_zero() {
        assert_eq!(&encode_size(0).unwrap(), b"0               ");
    }

    #[test]
    fn test_encode_size_overflow() {
        // 17 digits cannot fit
        let result = encode_size(10_000_000_000_000_000);
        assert!(matches!(result, Err(ProtocolError::SizeOverflow(_))));

        // 16 digits still fit
        let field = encode_size(9_999_999_999_999_999).unwrap();
        assert_eq!(&field, b"9999999999999999");
    }

    #[test]
    fn test_decode_accepts_both_padding_styles() {
        assert_eq!(decode_size(b"42              ").unwrap(), 42);
        assert_eq!(decode_size(b"              42").unwrap(), 42);
        assert_eq!(decode_size(b"0000000000000042").unwrap(), 42);
        assert_eq!(decode_size(b"42\0\0\0\0\0\0\0\0\0\0\0\0\0\0").unwrap(), 42);
    }

    #[test]
    fn test_decode_rejects_non_numeric() {
        assert!(matches!(
            decode_size(b"12a4            "),
            Err(ProtocolError::MalformedSize(_))
        ));
        assert!(matches!(
            decode_size(b"-5              "),
            Err(ProtocolError::MalformedSize(_))
        ));
        assert!(matches!(
            decode_size(b"                "),
            Err(ProtocolError::MalformedSize(_))
        ));
        assert!(matches!(
            decode_size(b"1 2             "),
            Err(ProtocolError::MalformedSize(_))
        ));
    }

    #[test]
    fn test_decode_rejects_wrong_width() {
        assert!(matches!(
            decode_size(b"42"),
            Err(ProtocolError::MalformedSize(_))
        ));
        assert!(matches!(
            decode_size(b"42               "),
            Err(ProtocolError::MalformedSize(_))
        ));
    }

    #[test]
    fn test_token_roundtrip_utf8() {
        let encoded = encode_token("Überblick 2024.pdf");
        assert_eq!(decode_token(&encoded).unwrap(), "Überblick 2024.pdf");
    }

    #[test]
    fn test_decode_token_invalid_utf8() {
        assert!(matches!(
            decode_token(&[0xff, 0xfe]),
            Err(ProtocolError::InvalidUtf8)
        ));
    }

    proptest! {
        #[test]
        fn prop_size_field_roundtrip(n in 0u64..=9_999_999_999_999_999) {
            let field = encode_size(n).unwrap();
            prop_assert_eq!(field.len(), SIZE_FIELD_LEN);
            prop_assert_eq!(decode_size(&field).unwrap(), n);
        }
    }
}

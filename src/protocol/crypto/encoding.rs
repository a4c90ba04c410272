use super::CryptoError;

/// Concatenate two byte strings into a new buffer
#[must_use]
pub fn concat(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(a.len() + b.len());
    output.extend_from_slice(a);
    output.extend_from_slice(b);
    output
}

/// Uppercase hex, the form the host emits and expects
#[must_use]
pub fn hex_encode(data: &[u8]) -> String {
    hex::encode_upper(data)
}

/// Decode hex in either case
///
/// # Errors
///
/// Fails on odd length or any non-hex character.
pub fn hex_decode(text: &str) -> Result<Vec<u8>, CryptoError> {
    hex::decode(text.trim()).map_err(|e| CryptoError::InvalidHex(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_encode_uppercase() {
        assert_eq!(hex_encode(&[0x00, 0xab, 0xff]), "00ABFF");
    }

    #[test]
    fn test_hex_decode_mixed_case() {
        assert_eq!(hex_decode("00abFF").unwrap(), vec![0x00, 0xab, 0xff]);
    }

    #[test]
    fn test_hex_decode_rejects_odd_length() {
        assert!(matches!(hex_decode("ABC"), Err(CryptoError::InvalidHex(_))));
    }

    #[test]
    fn test_hex_decode_rejects_non_hex() {
        assert!(matches!(hex_decode("zz"), Err(CryptoError::InvalidHex(_))));
    }

    #[test]
    fn test_concat() {
        assert_eq!(concat(b"ab", b"cd"), b"abcd");
        assert_eq!(concat(b"", b""), b"");
    }
}

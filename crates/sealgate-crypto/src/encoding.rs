//! Text encodings for sealed values.
//!
//! Bodies and parameters use standard base64. Header tokens use URL-safe
//! base64 without padding so they survive header and cookie transport.

use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use sealgate_core::CryptoError;

/// Encode bytes for a request parameter or response body.
pub fn encode_body(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a value produced by [`encode_body`].
pub fn decode_body(text: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD.decode(text).map_err(|e| CryptoError::Encoding { reason: e.to_string() })
}

/// Encode bytes as a header-safe token.
pub fn encode_header(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode a value produced by [`encode_header`].
pub fn decode_header(text: &str) -> Result<Vec<u8>, CryptoError> {
    URL_SAFE_NO_PAD.decode(text).map_err(|e| CryptoError::Encoding { reason: e.to_string() })
}

/// Interpret decrypted bytes as UTF-8 text.
pub fn into_text(bytes: Vec<u8>) -> Result<String, CryptoError> {
    String::from_utf8(bytes).map_err(|e| CryptoError::Encoding { reason: e.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_encoding_is_url_safe() {
        let encoded = encode_header(&[0xfb, 0xff, 0xfe]);
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        assert!(!encoded.contains('='));
        assert_eq!(decode_header(&encoded).unwrap(), vec![0xfb, 0xff, 0xfe]);
    }

    #[test]
    fn body_rejects_header_alphabet() {
        let encoded = encode_header(&[0xfb, 0xff]);
        assert!(matches!(decode_body(&encoded), Err(CryptoError::Encoding { .. })));
    }

    #[test]
    fn invalid_utf8_is_an_encoding_error() {
        assert!(matches!(into_text(vec![0xff, 0xfe]), Err(CryptoError::Encoding { .. })));
    }
}

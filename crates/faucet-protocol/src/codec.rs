//! Base64 transport encoding
//!
//! Every binary value crosses the wire as standard, padded base64 text.

use base64::{Engine, engine::general_purpose::STANDARD};

use crate::ProtocolResult;

/// Encode bytes for a JSON field
pub fn encode_b64(data: impl AsRef<[u8]>) -> String {
    STANDARD.encode(data)
}

/// Decode a JSON field back into bytes
pub fn decode_b64(text: &str) -> ProtocolResult<Vec<u8>> {
    Ok(STANDARD.decode(text.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_key_encoding() {
        let encoded = encode_b64(b"MockServerPublicKey");
        assert_eq!(encoded, "TW9ja1NlcnZlclB1YmxpY0tleQ==");
        assert_eq!(decode_b64(&encoded).unwrap(), b"MockServerPublicKey");
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(decode_b64("not base64!!").is_err());
    }

    #[test]
    fn test_ignores_surrounding_whitespace() {
        assert_eq!(decode_b64("  aGk=\n").unwrap(), b"hi");
    }
}

//! Envelope container and wire framing
//!
//! Framed layout: `[version:1][wrapped_key_len:2 BE][wrapped_key][ciphertext]`

use crate::{CryptoError, CryptoResult, ENVELOPE_VERSION};

const HEADER_LEN: usize = 3;

/// Output of one hybrid encryption
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    ciphertext: Vec<u8>,
    wrapped_key: Vec<u8>,
}

impl Envelope {
    /// Assemble an envelope from its two components
    pub fn from_parts(ciphertext: Vec<u8>, wrapped_key: Vec<u8>) -> CryptoResult<Self> {
        if wrapped_key.len() > u16::MAX as usize {
            return Err(CryptoError::Encryption(format!(
                "wrapped key of {} bytes does not fit the envelope header",
                wrapped_key.len()
            )));
        }
        Ok(Self {
            ciphertext,
            wrapped_key,
        })
    }

    /// `[nonce][payload][tag]` under the content key
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Content key sealed for the recipient
    pub fn wrapped_key(&self) -> &[u8] {
        &self.wrapped_key
    }

    pub fn into_parts(self) -> (Vec<u8>, Vec<u8>) {
        (self.ciphertext, self.wrapped_key)
    }

    /// Serialize into a single blob
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(HEADER_LEN + self.wrapped_key.len() + self.ciphertext.len());
        out.push(ENVELOPE_VERSION);
        // from_parts bounds the length to u16
        out.extend_from_slice(&(self.wrapped_key.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.wrapped_key);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parse a framed blob. Malformed input is a decryption failure.
    pub fn from_bytes(data: &[u8]) -> CryptoResult<Self> {
        if data.len() < HEADER_LEN {
            return Err(CryptoError::Decryption("envelope truncated"));
        }
        if data[0] != ENVELOPE_VERSION {
            return Err(CryptoError::Decryption("unsupported envelope version"));
        }

        let wrapped_len = u16::from_be_bytes([data[1], data[2]]) as usize;
        let body = &data[HEADER_LEN..];
        if body.len() < wrapped_len {
            return Err(CryptoError::Decryption("envelope truncated"));
        }

        let (wrapped_key, ciphertext) = body.split_at(wrapped_len);
        Ok(Self {
            ciphertext: ciphertext.to_vec(),
            wrapped_key: wrapped_key.to_vec(),
        })
    }
}

//! Crypto envelope error types

use thiserror::Error;

/// Cryptographic operation error
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(&'static str),

    #[error("Plaintext too large: {size} bytes (max: {max})")]
    PlaintextTooLarge { size: usize, max: usize },
}

pub type CryptoResult<T> = Result<T, CryptoError>;

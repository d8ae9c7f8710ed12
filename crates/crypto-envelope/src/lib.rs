//! Crypto Envelope - Hybrid public-key encryption for the Faucet client
//!
//! A fresh ChaCha20Poly1305 content key encrypts the payload and is then
//! wrapped for the recipient, either through an ephemeral X25519 agreement
//! or with RSA-OAEP.

mod envelope;
mod error;
mod hybrid;
mod keys;

pub use envelope::*;
pub use error::*;
pub use hybrid::*;
pub use keys::*;

/// Nonce size for ChaCha20Poly1305 (96 bits / 12 bytes)
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size (128 bits / 16 bytes)
pub const TAG_SIZE: usize = 16;

/// Symmetric content key size (256 bits / 32 bytes)
pub const KEY_SIZE: usize = 32;

/// X25519 public and secret key size (256 bits / 32 bytes)
pub const X25519_KEY_SIZE: usize = 32;

/// RSA modulus sizes accepted for key generation
pub const SUPPORTED_RSA_BITS: [usize; 3] = [2048, 3072, 4096];

/// Largest plaintext accepted by [`encrypt`]
pub const MAX_PLAINTEXT_SIZE: usize = 32 * 1024 * 1024;

/// Leading byte of a framed envelope
pub const ENVELOPE_VERSION: u8 = 1;

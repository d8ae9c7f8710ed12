//! Hybrid encryption: ChaCha20Poly1305 payload, asymmetric key wrap
//!
//! Every call draws a fresh content key and nonce from the OS RNG.
//!
//! Wrapped key layouts:
//! - X25519: `[ephemeral_pubkey:32][nonce:12][sealed content key:32][tag:16]`,
//!   sealed under `HKDF-SHA256(DH(ephemeral, recipient))` salted with both
//!   public keys.
//! - RSA: `RSA-OAEP-SHA256(content key)`, one modulus in length.

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit},
};
use hkdf::Hkdf;
use rand::RngCore;
use rand::rngs::OsRng;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use tracing::debug;
use x25519_dalek::{EphemeralSecret, StaticSecret};
use zeroize::Zeroizing;

use crate::{
    CryptoError, CryptoResult, Envelope, KEY_SIZE, MAX_PLAINTEXT_SIZE, NONCE_SIZE, PrivateKey,
    PublicKey, TAG_SIZE, X25519_KEY_SIZE,
};

/// HKDF info string for the X25519 key-encryption key
const WRAP_INFO: &[u8] = b"faucet-envelope-v1 key wrap";

/// Length of an X25519 wrapped key
pub const X25519_WRAPPED_KEY_SIZE: usize = X25519_KEY_SIZE + NONCE_SIZE + KEY_SIZE + TAG_SIZE;

type SymmetricKey = Zeroizing<[u8; KEY_SIZE]>;

/// Encrypt `plaintext` for the holder of `recipient_public_key`
///
/// The key is accepted in any form [`PublicKey::from_bytes`] understands.
pub fn encrypt(plaintext: &[u8], recipient_public_key: &[u8]) -> CryptoResult<Envelope> {
    let recipient = PublicKey::from_bytes(recipient_public_key)?;
    seal(plaintext, &recipient)
}

/// Decrypt an envelope's components with the recipient's private key
///
/// Never returns unauthenticated output: any key mismatch or tampering
/// surfaces as [`CryptoError::Decryption`].
pub fn decrypt(
    ciphertext: &[u8],
    wrapped_key: &[u8],
    recipient_private_key: &[u8],
) -> CryptoResult<Vec<u8>> {
    let recipient = PrivateKey::from_bytes(recipient_private_key)?;
    open_parts(ciphertext, wrapped_key, &recipient)
}

/// Encrypt for an already parsed public key
pub fn seal(plaintext: &[u8], recipient: &PublicKey) -> CryptoResult<Envelope> {
    if plaintext.len() > MAX_PLAINTEXT_SIZE {
        return Err(CryptoError::PlaintextTooLarge {
            size: plaintext.len(),
            max: MAX_PLAINTEXT_SIZE,
        });
    }

    let mut content_key: SymmetricKey = Zeroizing::new([0u8; KEY_SIZE]);
    OsRng.fill_bytes(&mut content_key[..]);

    let ciphertext = aead_seal(&content_key, plaintext)?;
    let wrapped_key = match recipient {
        PublicKey::X25519(key) => wrap_x25519(&content_key, key)?,
        PublicKey::Rsa(key) => wrap_rsa(&content_key, key)?,
    };

    debug!(
        algorithm = %recipient.algorithm(),
        plaintext_len = plaintext.len(),
        ciphertext_len = ciphertext.len(),
        "sealed envelope"
    );

    Envelope::from_parts(ciphertext, wrapped_key)
}

/// Decrypt an envelope with an already parsed private key
pub fn open(envelope: &Envelope, recipient: &PrivateKey) -> CryptoResult<Vec<u8>> {
    open_parts(envelope.ciphertext(), envelope.wrapped_key(), recipient)
}

fn open_parts(
    ciphertext: &[u8],
    wrapped_key: &[u8],
    recipient: &PrivateKey,
) -> CryptoResult<Vec<u8>> {
    let content_key = match recipient {
        PrivateKey::X25519(secret) => unwrap_x25519(wrapped_key, secret)?,
        PrivateKey::Rsa(key) => unwrap_rsa(wrapped_key, key)?,
    };

    let plaintext = aead_open(&content_key, ciphertext)?;
    debug!(plaintext_len = plaintext.len(), "opened envelope");
    Ok(plaintext)
}

/// Returns `[nonce][ciphertext][tag]`
fn aead_seal(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);

    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_SIZE + sealed.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&sealed);
    Ok(out)
}

fn aead_open(key: &[u8; KEY_SIZE], data: &[u8]) -> CryptoResult<Vec<u8>> {
    if data.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::Decryption("ciphertext too short"));
    }

    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|_| CryptoError::Decryption("invalid content key"))?;

    let (nonce_bytes, sealed) = data.split_at(NONCE_SIZE);
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), sealed)
        .map_err(|_| CryptoError::Decryption("authentication tag mismatch"))
}

fn derive_kek(
    shared_secret: &[u8; X25519_KEY_SIZE],
    ephemeral_public: &[u8; X25519_KEY_SIZE],
    recipient_public: &[u8; X25519_KEY_SIZE],
) -> CryptoResult<SymmetricKey> {
    let mut salt = [0u8; 2 * X25519_KEY_SIZE];
    salt[..X25519_KEY_SIZE].copy_from_slice(ephemeral_public);
    salt[X25519_KEY_SIZE..].copy_from_slice(recipient_public);

    let hk = Hkdf::<Sha256>::new(Some(&salt), shared_secret);
    let mut kek: SymmetricKey = Zeroizing::new([0u8; KEY_SIZE]);
    hk.expand(WRAP_INFO, &mut kek[..])
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    Ok(kek)
}

fn wrap_x25519(
    content_key: &[u8; KEY_SIZE],
    recipient: &x25519_dalek::PublicKey,
) -> CryptoResult<Vec<u8>> {
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = x25519_dalek::PublicKey::from(&ephemeral);

    let shared_secret = ephemeral.diffie_hellman(recipient);
    if !shared_secret.was_contributory() {
        return Err(CryptoError::InvalidKey(
            "X25519 public key has low order".into(),
        ));
    }

    let kek = derive_kek(
        shared_secret.as_bytes(),
        ephemeral_public.as_bytes(),
        recipient.as_bytes(),
    )?;
    let sealed_key = aead_seal(&kek, content_key)?;

    let mut wrapped = Vec::with_capacity(X25519_WRAPPED_KEY_SIZE);
    wrapped.extend_from_slice(ephemeral_public.as_bytes());
    wrapped.extend_from_slice(&sealed_key);
    Ok(wrapped)
}

fn unwrap_x25519(wrapped: &[u8], secret: &StaticSecret) -> CryptoResult<SymmetricKey> {
    if wrapped.len() != X25519_WRAPPED_KEY_SIZE {
        return Err(CryptoError::Decryption("wrapped key has wrong length"));
    }

    let (ephemeral_bytes, sealed_key) = wrapped.split_at(X25519_KEY_SIZE);
    let ephemeral_bytes: [u8; X25519_KEY_SIZE] = ephemeral_bytes
        .try_into()
        .map_err(|_| CryptoError::Decryption("wrapped key has wrong length"))?;
    let ephemeral_public = x25519_dalek::PublicKey::from(ephemeral_bytes);

    let shared_secret = secret.diffie_hellman(&ephemeral_public);
    if !shared_secret.was_contributory() {
        return Err(CryptoError::Decryption("ephemeral key has low order"));
    }

    let recipient_public = x25519_dalek::PublicKey::from(secret);
    let kek = derive_kek(
        shared_secret.as_bytes(),
        ephemeral_public.as_bytes(),
        recipient_public.as_bytes(),
    )
    .map_err(|_| CryptoError::Decryption("key derivation failed"))?;

    let content_key = Zeroizing::new(aead_open(&kek, sealed_key)?);
    to_symmetric_key(&content_key)
}

fn wrap_rsa(content_key: &[u8; KEY_SIZE], recipient: &RsaPublicKey) -> CryptoResult<Vec<u8>> {
    recipient
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), content_key)
        .map_err(|e| CryptoError::Encryption(e.to_string()))
}

fn unwrap_rsa(wrapped: &[u8], key: &RsaPrivateKey) -> CryptoResult<SymmetricKey> {
    let content_key = Zeroizing::new(
        key.decrypt(Oaep::new::<Sha256>(), wrapped)
            .map_err(|_| CryptoError::Decryption("key unwrap failed"))?,
    );
    to_symmetric_key(&content_key)
}

fn to_symmetric_key(bytes: &[u8]) -> CryptoResult<SymmetricKey> {
    let key: [u8; KEY_SIZE] = bytes
        .try_into()
        .map_err(|_| CryptoError::Decryption("content key has wrong length"))?;
    Ok(Zeroizing::new(key))
}

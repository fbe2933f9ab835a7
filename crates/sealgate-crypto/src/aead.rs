//! Value encryption using `XChaCha20-Poly1305`
//!
//! Pure functions: the nonce is provided by the caller so tests stay
//! deterministic. Sealed output is `nonce || ciphertext || tag`.

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use sealgate_core::CryptoError;

/// Size of the random `XChaCha20` nonce (24 bytes)
pub const NONCE_SIZE: usize = 24;

/// Poly1305 tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// Encrypt `plaintext` under `key` with the given nonce.
///
/// # Security
///
/// - Caller MUST provide a fresh random nonce for every call
/// - Authenticated encryption prevents tampering
pub fn seal(key: &[u8; 32], nonce: [u8; NONCE_SIZE], plaintext: &[u8]) -> Vec<u8> {
    let cipher = XChaCha20Poly1305::new(key.into());

    let Ok(ciphertext) = cipher.encrypt(XNonce::from_slice(&nonce), plaintext) else {
        unreachable!("XChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    sealed
}

/// Decrypt a value produced by [`seal`].
///
/// # Errors
///
/// - `CryptoError::Decryption` if the input is too short to hold a nonce and
///   tag, or the authentication tag does not verify (wrong key or tamper)
pub fn open(key: &[u8; 32], sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::Decryption {
            reason: format!("sealed value too short: {} bytes", sealed.len()),
        });
    }

    let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
    let cipher = XChaCha20Poly1305::new(key.into());

    cipher.decrypt(XNonce::from_slice(nonce), ciphertext).map_err(|_| CryptoError::Decryption {
        reason: "authentication failed".to_string(),
    })
}

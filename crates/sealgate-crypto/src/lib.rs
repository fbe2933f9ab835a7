//! Sealgate Cryptographic Primitives
//!
//! Reference implementation of the [`sealgate_core::CryptoFacade`] contract.
//!
//! # Key Lifecycle
//!
//! The embedding parent creates a session, generates a pair of directional
//! secrets for it, and seals them into the session token under a key derived
//! from the session id. The embedded client opens them once, at handshake
//! time, and holds them in a [`SharedKeyring`] for the rest of the session.
//!
//! ```text
//! session id (sid)                      issuer signing key
//!        │                                      │
//!        ▼                                      ▼
//! HKDF-SHA256 → session key              HMAC-SHA256 over header.claims
//!        │                               (checked by the issuer only)
//!        ▼
//! opens claims.keyring.b → { a, b, x, y }
//!                                │
//!                                ▼
//!                 SharedKeyring { inbound: x, outbound: y }
//!                                │
//!                                ▼
//!                     AEAD Encryption → Ciphertext
//! ```
//!
//! # Security
//!
//! Direction separation:
//! - `inbound` only ever decrypts (server → client), `outbound` only ever
//!   encrypts (client → server)
//! - The server holds the [`SharedKeyring::mirrored`] view
//!
//! Authenticity:
//! - XChaCha20-Poly1305 AEAD with a random 24-byte nonce per value
//! - Token claims are MACed with the issuer's own signing key, independent
//!   of the session id; only [`TokenIssuer::verify_signature`] checks it
//! - Failed authentication tag -> reject value
//!
//! Hygiene:
//! - Secrets are zeroized on drop and never appear in `Debug` output

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod aead;
pub mod claims;
pub mod encoding;
pub mod error;
pub mod facade;
pub mod keyring;

#[cfg(test)]
mod test_env;

pub use claims::{SessionClaims, TokenIssuer, derive_session_key, verify_claims};
pub use error::KeyMaterialError;
pub use facade::{FacadeLoader, SealgateFacade};
pub use keyring::{KeyringSecrets, SECRET_SIZE, SharedKeyring};

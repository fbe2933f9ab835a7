//! Fake crypto façade for simulation.
//!
//! The keyring is a keyed XOR with hex encoding. It is not encryption, but it
//! obeys the round-trip law, never maps a value to itself, and derives its
//! key from the session token, so tests can build the server's side of the
//! channel with [`FakeKeyring::for_token`].

use std::{cell::Cell, rc::Rc};

use sealgate_core::{CryptoError, CryptoFacade, Keyring};

const BODY_TAG: &str = "b:";
const HEADER_TAG: &str = "h:";

/// Tokens starting with this prefix fail claims verification.
pub const REJECTED_TOKEN_PREFIX: &str = "bad";

/// Symmetric fake keyring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeKeyring {
    key: u8,
}

impl FakeKeyring {
    /// Keyring a session with `token` would derive.
    pub fn for_token(token: &str) -> Self {
        let key = token.bytes().fold(0x5a_u8, |acc, b| acc.rotate_left(3) ^ b);
        Self { key }
    }

    fn seal(&self, tag: &str, value: &str) -> String {
        let mut out = String::with_capacity(tag.len() + value.len() * 2);
        out.push_str(tag);
        for byte in value.bytes() {
            out.push_str(&format!("{:02x}", byte ^ self.key));
        }
        out
    }

    fn open(&self, tag: &str, sealed: &str) -> Result<String, CryptoError> {
        let hex = sealed.strip_prefix(tag).ok_or_else(|| CryptoError::Decryption {
            reason: format!("missing {tag} tag"),
        })?;
        if hex.len() % 2 != 0 {
            return Err(CryptoError::Encoding { reason: "odd hex length".to_string() });
        }

        let bytes = (0..hex.len())
            .step_by(2)
            .map(|i| {
                hex.get(i..i + 2)
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                    .map(|b| b ^ self.key)
            })
            .collect::<Option<Vec<u8>>>()
            .ok_or_else(|| CryptoError::Encoding { reason: "not hex".to_string() })?;

        String::from_utf8(bytes).map_err(|e| CryptoError::Encoding { reason: e.to_string() })
    }
}

impl Keyring for FakeKeyring {
    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        Ok(self.seal(BODY_TAG, plaintext))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        self.open(BODY_TAG, ciphertext)
    }

    fn encrypt_header(&self, value: &str) -> Result<String, CryptoError> {
        Ok(self.seal(HEADER_TAG, value))
    }

    fn decrypt_header(&self, token: &str) -> Result<String, CryptoError> {
        self.open(HEADER_TAG, token)
    }
}

/// Façade that loads on demand and counts keyring derivations.
///
/// Clones share state, so a test keeps one clone to flip
/// [`FakeFacade::mark_loaded`] while the session owns another.
#[derive(Debug, Clone, Default)]
pub struct FakeFacade {
    loaded: Rc<Cell<bool>>,
    derivations: Rc<Cell<u32>>,
}

impl FakeFacade {
    /// Façade whose primitives are still loading.
    pub fn new() -> Self {
        Self::default()
    }

    /// Façade whose primitives are available.
    pub fn preloaded() -> Self {
        let facade = Self::new();
        facade.mark_loaded();
        facade
    }

    /// Make the primitives available.
    pub fn mark_loaded(&self) {
        self.loaded.set(true);
    }

    /// Number of keyrings built so far.
    pub fn derivations(&self) -> u32 {
        self.derivations.get()
    }
}

impl CryptoFacade for FakeFacade {
    type Claims = String;
    type Keyring = FakeKeyring;

    fn is_loaded(&self) -> bool {
        self.loaded.get()
    }

    fn verify_claims(
        &self,
        _origin: &str,
        token: &str,
        _pubkey: Option<&str>,
    ) -> Result<String, CryptoError> {
        if !self.is_loaded() {
            return Err(CryptoError::NotLoaded);
        }
        if token.starts_with(REJECTED_TOKEN_PREFIX) {
            return Err(CryptoError::InvalidClaims { reason: "rejected token".to_string() });
        }
        Ok(token.to_string())
    }

    fn keyring(&self, claims: String) -> Result<FakeKeyring, CryptoError> {
        self.derivations.set(self.derivations.get() + 1);
        Ok(FakeKeyring::for_token(&claims))
    }
}

//! Crypto primitive façade.
//!
//! The core consumes cryptography through these two traits and nothing else.
//! Implementations are trusted: the core only relies on the round-trip laws
//!
//! ```text
//! decrypt_header(encrypt_header(x)) == x
//! decrypt(encrypt(x))               == x
//! ```
//!
//! holding between the client keyring and its peer (for a symmetric test
//! keyring, the keyring itself).

use crate::error::CryptoError;

/// Session keyring derived from verified claims.
///
/// Owned by the [`crate::TokenStore`] for the lifetime of the session.
/// Implementations must not expose key material through `Debug` and must not
/// implement `Serialize`.
pub trait Keyring {
    /// Encrypt a request parameter or body value.
    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError>;

    /// Decrypt a response body value.
    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError>;

    /// Encrypt a value into a header-safe token.
    fn encrypt_header(&self, value: &str) -> Result<String, CryptoError>;

    /// Decrypt a header token.
    fn decrypt_header(&self, token: &str) -> Result<String, CryptoError>;
}

/// Entry point to the crypto primitives.
///
/// The primitives may finish loading after the handshake message has
/// arrived; [`CryptoFacade::is_loaded`] is the readiness predicate the
/// [`crate::ReadinessGate`] polls.
pub trait CryptoFacade {
    /// Verified claims, consumed to build the keyring.
    type Claims;

    /// Keyring type produced from claims.
    type Keyring: Keyring;

    /// Whether the primitives are available yet.
    fn is_loaded(&self) -> bool;

    /// Verify the session token issued by `origin`.
    ///
    /// # Errors
    ///
    /// - `CryptoError::InvalidClaims` if the token is malformed, expired,
    ///   issued by someone else, or does not match `pubkey`
    /// - `CryptoError::NotLoaded` if called before [`Self::is_loaded`]
    fn verify_claims(
        &self,
        origin: &str,
        token: &str,
        pubkey: Option<&str>,
    ) -> Result<Self::Claims, CryptoError>;

    /// Build the session keyring from verified claims.
    fn keyring(&self, claims: Self::Claims) -> Result<Self::Keyring, CryptoError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Symmetric stand-ins for unit tests.

    use std::{cell::Cell, rc::Rc};

    use super::{CryptoError, CryptoFacade, Keyring};

    /// Reverses and tags values. Obeys the round-trip law and never maps a
    /// non-empty input to itself.
    #[derive(Debug, Clone, Default)]
    pub struct ReversingKeyring {
        pub fail_encrypt: bool,
    }

    impl ReversingKeyring {
        fn seal(tag: &str, value: &str) -> String {
            format!("{tag}:{}", value.chars().rev().collect::<String>())
        }

        fn open(tag: &str, value: &str) -> Result<String, CryptoError> {
            value
                .strip_prefix(tag)
                .and_then(|v| v.strip_prefix(':'))
                .map(|v| v.chars().rev().collect())
                .ok_or_else(|| CryptoError::Decryption { reason: format!("not {tag}") })
        }
    }

    impl Keyring for ReversingKeyring {
        fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
            if self.fail_encrypt {
                return Err(CryptoError::Encryption { reason: "test".to_string() });
            }
            Ok(Self::seal("enc", plaintext))
        }

        fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
            Self::open("enc", ciphertext)
        }

        fn encrypt_header(&self, value: &str) -> Result<String, CryptoError> {
            Ok(Self::seal("hdr", value))
        }

        fn decrypt_header(&self, token: &str) -> Result<String, CryptoError> {
            Self::open("hdr", token)
        }
    }

    /// Façade that loads on demand and counts derivations.
    #[derive(Debug, Clone, Default)]
    pub struct TestFacade {
        pub loaded: Rc<Cell<bool>>,
        pub reject_claims: bool,
        pub keyrings_built: Rc<Cell<u32>>,
    }

    impl TestFacade {
        pub fn loaded() -> Self {
            let facade = Self::default();
            facade.loaded.set(true);
            facade
        }
    }

    impl CryptoFacade for TestFacade {
        type Claims = String;
        type Keyring = ReversingKeyring;

        fn is_loaded(&self) -> bool {
            self.loaded.get()
        }

        fn verify_claims(
            &self,
            _origin: &str,
            token: &str,
            _pubkey: Option<&str>,
        ) -> Result<String, CryptoError> {
            if self.reject_claims {
                return Err(CryptoError::InvalidClaims { reason: "rejected".to_string() });
            }
            Ok(token.to_string())
        }

        fn keyring(&self, _claims: String) -> Result<ReversingKeyring, CryptoError> {
            self.keyrings_built.set(self.keyrings_built.get() + 1);
            Ok(ReversingKeyring::default())
        }
    }

    #[test]
    fn reversing_keyring_round_trips() {
        let keyring = ReversingKeyring::default();
        for value in ["", "a", "abc", "héllo wörld"] {
            let sealed = keyring.encrypt(value).unwrap();
            assert_ne!(sealed, value);
            assert_eq!(keyring.decrypt(&sealed).unwrap(), value);

            let header = keyring.encrypt_header(value).unwrap();
            assert_eq!(keyring.decrypt_header(&header).unwrap(), value);
        }
    }
}

//! Shared session keyring.
//!
//! Both peers hold the same two secrets with opposite roles. The client
//! encrypts with `outbound` and decrypts with `inbound`; the server holds
//! the [`SharedKeyring::mirrored`] view, so whatever one side seals the
//! other side opens:
//!
//! ```text
//! client.decrypt(server.encrypt(x)) == x
//! server.decrypt(client.encrypt(x)) == x
//! ```
//!
//! A keyring cannot open what it sealed itself.

use sealgate_core::{CryptoError, Environment, Keyring};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use crate::{
    aead::{self, NONCE_SIZE},
    encoding,
    error::KeyMaterialError,
};

/// Size of each directional secret (32 bytes)
pub const SECRET_SIZE: usize = 32;

/// Wire form of the secrets sealed into a session token.
///
/// Field names are the compact names used inside the token payload.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyringSecrets {
    /// Server public identity
    pub a: String,
    /// Client identity
    pub b: String,
    /// Server → client secret, hex
    pub x: String,
    /// Client → server secret, hex
    pub y: String,
}

impl KeyringSecrets {
    /// Generate fresh secrets for a new session.
    pub fn generate<E: Environment>(
        env: &E,
        server_identity: impl Into<String>,
        client_identity: impl Into<String>,
    ) -> Self {
        let mut inbound = Zeroizing::new([0u8; SECRET_SIZE]);
        let mut outbound = Zeroizing::new([0u8; SECRET_SIZE]);
        env.random_bytes(inbound.as_mut_slice());
        env.random_bytes(outbound.as_mut_slice());

        Self {
            a: server_identity.into(),
            b: client_identity.into(),
            x: hex::encode(inbound.as_slice()),
            y: hex::encode(outbound.as_slice()),
        }
    }
}

impl Drop for KeyringSecrets {
    fn drop(&mut self) {
        self.x.zeroize();
        self.y.zeroize();
    }
}

impl std::fmt::Debug for KeyringSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyringSecrets")
            .field("a", &self.a)
            .field("b", &self.b)
            .field("x", &"<redacted>")
            .field("y", &"<redacted>")
            .finish()
    }
}

/// Session keyring over `XChaCha20-Poly1305`.
///
/// Nonces come from the environment's RNG, so a seeded simulation produces
/// reproducible ciphertexts.
pub struct SharedKeyring<E> {
    env: E,
    server_identity: String,
    client_identity: String,
    inbound: [u8; SECRET_SIZE],
    outbound: [u8; SECRET_SIZE],
}

impl<E: Environment> SharedKeyring<E> {
    /// Client view of `secrets`.
    ///
    /// # Errors
    ///
    /// - `KeyMaterialError` if either secret is not 32 bytes of hex
    pub fn from_secrets(env: E, secrets: &KeyringSecrets) -> Result<Self, KeyMaterialError> {
        Ok(Self {
            env,
            server_identity: secrets.a.clone(),
            client_identity: secrets.b.clone(),
            inbound: parse_secret("x", &secrets.x)?,
            outbound: parse_secret("y", &secrets.y)?,
        })
    }

    /// Server public identity the secrets were issued under.
    pub fn server_identity(&self) -> &str {
        &self.server_identity
    }

    /// Client identity the secrets were issued to.
    pub fn client_identity(&self) -> &str {
        &self.client_identity
    }

    /// The peer's view: same secrets, directions swapped.
    #[must_use]
    pub fn mirrored(&self) -> Self {
        Self {
            env: self.env.clone(),
            server_identity: self.server_identity.clone(),
            client_identity: self.client_identity.clone(),
            inbound: self.outbound,
            outbound: self.inbound,
        }
    }

    fn seal(&self, plaintext: &str) -> Vec<u8> {
        let mut nonce = [0u8; NONCE_SIZE];
        self.env.random_bytes(&mut nonce);
        aead::seal(&self.outbound, nonce, plaintext.as_bytes())
    }

    fn open(&self, sealed: &[u8]) -> Result<String, CryptoError> {
        encoding::into_text(aead::open(&self.inbound, sealed)?)
    }
}

impl<E: Environment> Keyring for SharedKeyring<E> {
    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        Ok(encoding::encode_body(&self.seal(plaintext)))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        self.open(&encoding::decode_body(ciphertext)?)
    }

    fn encrypt_header(&self, value: &str) -> Result<String, CryptoError> {
        Ok(encoding::encode_header(&self.seal(value)))
    }

    fn decrypt_header(&self, token: &str) -> Result<String, CryptoError> {
        self.open(&encoding::decode_header(token)?)
    }
}

impl<E> Drop for SharedKeyring<E> {
    fn drop(&mut self) {
        self.inbound.zeroize();
        self.outbound.zeroize();
    }
}

impl<E> std::fmt::Debug for SharedKeyring<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedKeyring")
            .field("server_identity", &self.server_identity)
            .field("client_identity", &self.client_identity)
            .finish_non_exhaustive()
    }
}

fn parse_secret(field: &'static str, text: &str) -> Result<[u8; SECRET_SIZE], KeyMaterialError> {
    let bytes = Zeroizing::new(
        hex::decode(text).map_err(|e| KeyMaterialError::NotHex { field, reason: e.to_string() })?,
    );

    <[u8; SECRET_SIZE]>::try_from(bytes.as_slice()).map_err(|_| KeyMaterialError::WrongLength {
        field,
        expected: SECRET_SIZE,
        actual: bytes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_env::CountingEnv;

    fn pair() -> (SharedKeyring<CountingEnv>, SharedKeyring<CountingEnv>) {
        let env = CountingEnv::default();
        let secrets = KeyringSecrets::generate(&env, "server-pk", "client-1");
        let client = SharedKeyring::from_secrets(env, &secrets).unwrap();
        let server = client.mirrored();
        (client, server)
    }

    #[test]
    fn server_to_client_roundtrip() {
        let (client, server) = pair();
        let sealed = server.encrypt("<p>fragment</p>").unwrap();
        assert_eq!(client.decrypt(&sealed).unwrap(), "<p>fragment</p>");
    }

    #[test]
    fn client_to_server_roundtrip() {
        let (client, server) = pair();
        let sealed = client.encrypt("hunter2").unwrap();
        assert_eq!(server.decrypt(&sealed).unwrap(), "hunter2");

        let header = client.encrypt_header("jwt").unwrap();
        assert_eq!(server.decrypt_header(&header).unwrap(), "jwt");
    }

    #[test]
    fn keyring_cannot_open_its_own_output() {
        let (client, _server) = pair();
        let sealed = client.encrypt("x").unwrap();
        assert!(matches!(client.decrypt(&sealed), Err(CryptoError::Decryption { .. })));
    }

    #[test]
    fn fresh_nonce_per_value() {
        let (client, _server) = pair();
        assert_ne!(client.encrypt("same").unwrap(), client.encrypt("same").unwrap());
    }

    #[test]
    fn header_tokens_are_url_safe() {
        let (_client, server) = pair();
        for _ in 0..16 {
            let token = server.encrypt_header("some auth token value").unwrap();
            assert!(token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }
    }

    #[test]
    fn identities_survive_mirroring() {
        let (client, server) = pair();
        assert_eq!(client.server_identity(), "server-pk");
        assert_eq!(server.client_identity(), "client-1");
    }

    #[test]
    fn rejects_malformed_secrets() {
        let env = CountingEnv::default();
        let mut secrets = KeyringSecrets::generate(&env, "a", "b");
        secrets.x = "zz".to_string();
        assert!(matches!(
            SharedKeyring::from_secrets(env.clone(), &secrets),
            Err(KeyMaterialError::NotHex { field: "x", .. })
        ));

        secrets.x = hex::encode([1u8; 16]);
        assert_eq!(
            SharedKeyring::from_secrets(env, &secrets).unwrap_err(),
            KeyMaterialError::WrongLength { field: "x", expected: 32, actual: 16 }
        );
    }

    #[test]
    fn debug_output_hides_secrets() {
        let env = CountingEnv::default();
        let secrets = KeyringSecrets::generate(&env, "a", "b");
        let keyring = SharedKeyring::from_secrets(env, &secrets).unwrap();

        assert!(!format!("{secrets:?}").contains(&secrets.x));
        assert!(!format!("{keyring:?}").contains(&secrets.y));
    }
}

//! Session token claims.
//!
//! The embedding parent hands the client a three-segment token
//! `header.claims.signature`, each segment URL-safe base64 without padding.
//! The claims are JSON:
//!
//! ```text
//! { "exp": <unix secs>, "iss": <origin>, "sid": <session id>,
//!   "keyring": { "b": <sealed KeyringSecrets, base64> } }
//! ```
//!
//! The signature is an HMAC over `header.claims` with a key only the issuer
//! holds. The client cannot check it; it verifies what it can (structure,
//! issuer, expiry, server identity) and proves possession of the session id
//! by opening the sealed keyring under `HKDF-SHA256(sid)`. The server checks
//! the signature when the token comes back as the anti-forgery token.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sealgate_core::{CryptoError, Environment};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::{
    aead::{self, NONCE_SIZE},
    encoding,
    error::KeyMaterialError,
    keyring::KeyringSecrets,
};

type HmacSha256 = Hmac<Sha256>;

/// Label used for sealing-key derivation
const SESSION_KEY_LABEL: &[u8] = b"sealgateSessionKeyV1";

/// Signature algorithm named in the token header
const TOKEN_ALG: &str = "HS256";

#[derive(Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    typ: String,
}

#[derive(Serialize, Deserialize)]
struct SealedKeyring {
    b: String,
}

#[derive(Serialize, Deserialize)]
struct ClaimsPayload {
    exp: u64,
    iss: String,
    sid: String,
    keyring: SealedKeyring,
}

/// Verified session claims with the opened keyring secrets.
#[derive(Debug)]
pub struct SessionClaims {
    issuer: String,
    session_id: String,
    expires_at: u64,
    secrets: KeyringSecrets,
}

impl SessionClaims {
    /// Origin that issued the token.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Session id the keyring is bound to.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Expiry, seconds since the Unix epoch.
    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    /// Opened keyring secrets.
    pub fn secrets(&self) -> &KeyringSecrets {
        &self.secrets
    }
}

/// Derive the key that seals a session's keyring secrets.
///
/// Deterministic: the issuer and the client derive the same key from the
/// session id alone.
pub fn derive_session_key(session_id: &str) -> Zeroizing<[u8; 32]> {
    let hkdf = Hkdf::<Sha256>::new(None, session_id.as_bytes());

    let mut key = Zeroizing::new([0u8; 32]);
    let Ok(()) = hkdf.expand(SESSION_KEY_LABEL, key.as_mut_slice()) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };

    key
}

/// Verify a session token issued by `origin` at wall-clock time `now_secs`.
///
/// # Errors
///
/// - `CryptoError::InvalidClaims` if the token does not have three
///   segments, the claims do not parse, the issuer is not `origin`, the
///   token has expired, the keyring does not open under the session id, or
///   `pubkey` is given and differs from the sealed server identity
pub fn verify_claims(
    origin: &str,
    token: &str,
    pubkey: Option<&str>,
    now_secs: u64,
) -> Result<SessionClaims, CryptoError> {
    let (_header, claims, _signature) = split_token(token)?;

    let payload: ClaimsPayload = encoding::decode_header(claims)
        .map_err(invalid)
        .and_then(|bytes| serde_json::from_slice(&bytes).map_err(invalid))?;

    if payload.iss != origin {
        return Err(CryptoError::InvalidClaims {
            reason: format!("issuer {:?} is not {origin:?}", payload.iss),
        });
    }

    if payload.exp <= now_secs {
        return Err(CryptoError::InvalidClaims {
            reason: format!("expired at {}", payload.exp),
        });
    }

    let secrets = open_keyring(&payload.sid, &payload.keyring.b)?;

    if let Some(pubkey) = pubkey
        && pubkey != secrets.a
    {
        return Err(CryptoError::InvalidClaims {
            reason: "server identity does not match pubkey".to_string(),
        });
    }

    Ok(SessionClaims {
        issuer: payload.iss,
        session_id: payload.sid,
        expires_at: payload.exp,
        secrets,
    })
}

fn split_token(token: &str) -> Result<(&str, &str, &str), CryptoError> {
    let mut segments = token.split('.');
    match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(header), Some(claims), Some(signature), None) => Ok((header, claims, signature)),
        _ => Err(CryptoError::InvalidClaims { reason: "expected three segments".to_string() }),
    }
}

fn open_keyring(session_id: &str, sealed: &str) -> Result<KeyringSecrets, CryptoError> {
    let key = derive_session_key(session_id);
    let sealed = encoding::decode_body(sealed).map_err(invalid)?;
    let plaintext = Zeroizing::new(aead::open(&key, &sealed).map_err(invalid)?);
    serde_json::from_slice(&plaintext)
        .map_err(|e| KeyMaterialError::Malformed { reason: e.to_string() }.into())
}

fn invalid(err: impl std::fmt::Display) -> CryptoError {
    CryptoError::InvalidClaims { reason: err.to_string() }
}

/// Parent-side session token issuer.
///
/// Holds the signing key. Lives on the server that embeds the client.
pub struct TokenIssuer {
    issuer: String,
    signing_key: Zeroizing<[u8; 32]>,
    ttl_secs: u64,
}

impl TokenIssuer {
    /// Issuer for `origin` with tokens valid for `ttl_secs`.
    pub fn new(origin: impl Into<String>, signing_key: [u8; 32], ttl_secs: u64) -> Self {
        Self { issuer: origin.into(), signing_key: Zeroizing::new(signing_key), ttl_secs }
    }

    /// Origin written into the `iss` claim.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issue a token carrying `secrets` sealed under `session_id`.
    ///
    /// # Errors
    ///
    /// - `CryptoError::Encoding` if the claims cannot be serialized
    pub fn issue_session_token<E: Environment>(
        &self,
        env: &E,
        session_id: &str,
        secrets: &KeyringSecrets,
    ) -> Result<String, CryptoError> {
        let key = derive_session_key(session_id);
        let plaintext = Zeroizing::new(serde_json::to_vec(secrets).map_err(encoding_error)?);

        let mut nonce = [0u8; NONCE_SIZE];
        env.random_bytes(&mut nonce);
        let sealed = aead::seal(&key, nonce, &plaintext);

        let header = TokenHeader { alg: TOKEN_ALG.to_string(), typ: "JWT".to_string() };
        let payload = ClaimsPayload {
            exp: env.wall_clock_secs().saturating_add(self.ttl_secs),
            iss: self.issuer.clone(),
            sid: session_id.to_string(),
            keyring: SealedKeyring { b: encoding::encode_body(&sealed) },
        };

        let signing_input = format!(
            "{}.{}",
            encoding::encode_header(&serde_json::to_vec(&header).map_err(encoding_error)?),
            encoding::encode_header(&serde_json::to_vec(&payload).map_err(encoding_error)?),
        );
        let signature = encoding::encode_header(&self.mac(&signing_input).finalize().into_bytes());

        tracing::debug!(issuer = %self.issuer, exp = payload.exp, "issued session token");
        Ok(format!("{signing_input}.{signature}"))
    }

    /// Check the signature of a token this issuer produced.
    ///
    /// # Errors
    ///
    /// - `CryptoError::InvalidClaims` if the token is malformed or the
    ///   signature does not verify
    pub fn verify_signature(&self, token: &str) -> Result<(), CryptoError> {
        let (header, claims, signature) = split_token(token)?;
        let signature = encoding::decode_header(signature).map_err(invalid)?;

        self.mac(&format!("{header}.{claims}"))
            .verify_slice(&signature)
            .map_err(|_| CryptoError::InvalidClaims { reason: "bad signature".to_string() })
    }

    fn mac(&self, signing_input: &str) -> HmacSha256 {
        let Ok(mut mac) = HmacSha256::new_from_slice(self.signing_key.as_slice()) else {
            unreachable!("HMAC-SHA256 accepts any key size");
        };
        mac.update(signing_input.as_bytes());
        mac
    }
}

fn encoding_error(err: serde_json::Error) -> CryptoError {
    CryptoError::Encoding { reason: err.to_string() }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("issuer", &self.issuer)
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

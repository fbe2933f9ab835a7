//! Outgoing request signing.
//!
//! Attaches the session tokens to every request and encrypts its parameters
//! with the session keyring. Before the handshake completes there is nothing
//! to attach and no keyring, so requests pass through untouched (best
//! effort). Callers that need confidentiality before that point must hold
//! their requests until [`crate::Handshake::on_loaded`] fires.

use std::collections::BTreeMap;

use crate::{
    config::HeaderNames,
    engine::ConfigRequest,
    error::RequestError,
    facade::Keyring,
    store::TokenStore,
};

/// What [`RequestInterceptor::sign`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignedRequest {
    /// Auth token header attached
    pub auth_token: bool,
    /// Anti-forgery token header attached
    pub anti_forgery_token: bool,
    /// Number of parameter values encrypted
    pub encrypted_parameters: usize,
}

impl SignedRequest {
    /// Whether the request was left exactly as it was.
    pub fn is_untouched(&self) -> bool {
        *self == Self::default()
    }
}

/// Signs requests for the "configure request" hook.
#[derive(Debug, Clone, Default)]
pub struct RequestInterceptor {
    headers: HeaderNames,
}

impl RequestInterceptor {
    /// Interceptor writing the given header names.
    pub fn new(headers: HeaderNames) -> Self {
        Self { headers }
    }

    /// Attach tokens and encrypt parameters in place.
    ///
    /// Parameter encryption is all-or-nothing: if any value fails, the
    /// request is left unmodified.
    ///
    /// # Errors
    ///
    /// - `RequestError::Encryption` if the keyring fails on a parameter. The
    ///   request must not be sent.
    pub fn sign<K: Keyring>(
        &self,
        store: &TokenStore<K>,
        request: &mut ConfigRequest,
    ) -> Result<SignedRequest, RequestError> {
        let encrypted = match store.keyring() {
            Some(keyring) => Some(encrypt_parameters(keyring, &request.parameters)?),
            None => None,
        };

        let mut signed = SignedRequest::default();

        if let Some(token) = store.auth_token() {
            request.headers.insert(&self.headers.auth, token);
            signed.auth_token = true;
        }

        if let Some(token) = store.anti_forgery_token() {
            request.headers.insert(&self.headers.anti_forgery, token);
            signed.anti_forgery_token = true;
        }

        if let Some(parameters) = encrypted {
            signed.encrypted_parameters = parameters.len();
            request.parameters = parameters;
        }

        tracing::trace!(
            verb = %request.verb,
            path = %request.path,
            encrypted = signed.encrypted_parameters,
            "signed request"
        );
        Ok(signed)
    }
}

fn encrypt_parameters<K: Keyring>(
    keyring: &K,
    parameters: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>, RequestError> {
    parameters
        .iter()
        .map(|(name, value)| {
            keyring
                .encrypt(value)
                .map(|sealed| (name.clone(), sealed))
                .map_err(|source| RequestError::Encryption { parameter: name.clone(), source })
        })
        .collect()
}

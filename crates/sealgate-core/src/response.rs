//! Incoming response handling.
//!
//! Two independent steps run on every response before the engine swaps it:
//!
//! 1. Auth token rotation: the response may carry a fresh authentication
//!    token in a header. It is decrypted and immediately re-encrypted into
//!    the store's header-token form, which also proves it is genuine
//!    ciphertext from this session's keyring.
//! 2. Fragment substitution: an encrypted fragment body is decrypted,
//!    processed by the engine in a fresh container, and spliced into the
//!    target in place of its previous children.
//!
//! Both steps degrade to pass-through. A missing header means no rotation
//! this round; a body that is not an encrypted fragment is left for the
//! engine to swap as usual.

use serde::Deserialize;

use crate::{
    config::HeaderNames,
    engine::{BeforeSwap, UiEngine},
    error::CryptoError,
    facade::Keyring,
    headers::Headers,
    store::TokenStore,
};

/// Result of looking for a rotated auth token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRotation {
    /// No token in this response
    Absent,
    /// Token validated and stored
    Rotated,
    /// No keyring yet; token parked until the handshake loads
    Deferred,
    /// Token failed to decrypt and was discarded
    Rejected,
}

/// Result of fragment substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    /// Decrypted content was spliced into the target; the engine's own swap
    /// is disabled
    Substituted,
    /// Response left for the engine to handle unmodified
    PassThrough,
}

/// Combined result of [`ResponseInterceptor::intercept`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseOutcome {
    /// Auth token handling
    pub rotation: AuthRotation,
    /// Body handling
    pub swap: SwapOutcome,
}

/// Body envelope for a server-rendered encrypted fragment.
#[derive(Deserialize)]
struct EncryptedFragment {
    fragment: String,
}

/// Decrypts responses for the "before swap" hook.
///
/// Owns the deferred rotation slot: a token that arrives before the keyring
/// exists is kept (last write wins) and applied by
/// [`ResponseInterceptor::apply_deferred`] once the handshake loads.
#[derive(Debug, Clone, Default)]
pub struct ResponseInterceptor {
    headers: HeaderNames,
    deferred: Option<String>,
}

impl ResponseInterceptor {
    /// Interceptor reading the given header names.
    pub fn new(headers: HeaderNames) -> Self {
        Self { headers, deferred: None }
    }

    /// Whether a token is waiting for the keyring.
    pub fn has_deferred(&self) -> bool {
        self.deferred.is_some()
    }

    /// Run both steps on a response.
    pub fn intercept<K, U>(
        &mut self,
        store: &TokenStore<K>,
        engine: &mut U,
        swap: &mut BeforeSwap<U::Element>,
    ) -> ResponseOutcome
    where
        K: Keyring,
        U: UiEngine,
    {
        let rotation = self.rotate_auth_token(store, &swap.response.headers);
        let swap = self.substitute(store, engine, swap);
        ResponseOutcome { rotation, swap }
    }

    /// Read and store a rotated auth token from `headers`.
    pub fn rotate_auth_token<K: Keyring>(
        &mut self,
        store: &TokenStore<K>,
        headers: &Headers,
    ) -> AuthRotation {
        let Some(token) = headers.get(&self.headers.auth).filter(|t| !t.is_empty()) else {
            return AuthRotation::Absent;
        };

        let Some(keyring) = store.keyring() else {
            tracing::debug!("auth token arrived before keyring, deferring rotation");
            self.deferred = Some(token.to_string());
            return AuthRotation::Deferred;
        };

        Self::rotate(keyring, store, token)
    }

    /// Apply a token parked by [`Self::rotate_auth_token`].
    ///
    /// Returns `Absent` if nothing was parked and `Deferred` if the keyring
    /// still does not exist (the token stays parked).
    pub fn apply_deferred<K: Keyring>(&mut self, store: &TokenStore<K>) -> AuthRotation {
        let Some(keyring) = store.keyring() else {
            return if self.deferred.is_some() {
                AuthRotation::Deferred
            } else {
                AuthRotation::Absent
            };
        };

        match self.deferred.take() {
            Some(token) => Self::rotate(keyring, store, &token),
            None => AuthRotation::Absent,
        }
    }

    fn rotate<K: Keyring>(keyring: &K, store: &TokenStore<K>, token: &str) -> AuthRotation {
        let rewrapped = keyring
            .decrypt_header(token)
            .and_then(|plain| keyring.encrypt_header(&plain));

        match rewrapped {
            Ok(normalized) => {
                store.set_auth_token(normalized);
                tracing::debug!("auth token rotated");
                AuthRotation::Rotated
            },
            Err(err) => {
                log_rejected(&err);
                AuthRotation::Rejected
            },
        }
    }

    /// Decrypt an encrypted fragment body and splice it into the target.
    pub fn substitute<K, U>(
        &self,
        store: &TokenStore<K>,
        engine: &mut U,
        swap: &mut BeforeSwap<U::Element>,
    ) -> SwapOutcome
    where
        K: Keyring,
        U: UiEngine,
    {
        let Some(keyring) = store.keyring() else {
            return SwapOutcome::PassThrough;
        };

        let Ok(envelope) = serde_json::from_str::<EncryptedFragment>(&swap.server_response) else {
            return SwapOutcome::PassThrough;
        };

        let markup = match keyring.decrypt(&envelope.fragment) {
            Ok(markup) => markup,
            Err(err) => {
                tracing::warn!(error = %err, "failed to decrypt response fragment");
                return SwapOutcome::PassThrough;
            },
        };

        let container = engine.create_container(&markup);
        engine.process(&container);
        engine.clear_children(&swap.target);
        engine.append_child(&swap.target, container);
        swap.should_swap = false;

        SwapOutcome::Substituted
    }
}

fn log_rejected(err: &CryptoError) {
    tracing::warn!(error = %err, "discarding auth token that failed to decrypt");
}

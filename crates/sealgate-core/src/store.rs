//! Session token store.
//!
//! Holds the three per-session values: the keyring, the anti-forgery token
//! and the rotating authentication token.
//!
//! # Invariants
//!
//! - Keyring and anti-forgery token are installed together, once, by the
//!   handshake. Neither can exist without the other.
//! - Once installed they never change for the lifetime of the store.
//! - The authentication token is written only by the response interceptor and
//!   is replaced wholesale on every rotation (last write wins).

use std::cell::{OnceCell, RefCell};

use crate::{error::StoreError, facade::Keyring};

/// Session-lifetime secrets derived by the handshake.
struct SessionSecrets<K> {
    keyring: K,
    anti_forgery_token: String,
}

/// Per-session token store.
///
/// Single-threaded: passed by reference to the handshake and both
/// interceptors on the same event loop.
pub struct TokenStore<K> {
    session: OnceCell<SessionSecrets<K>>,
    auth_token: RefCell<Option<String>>,
}

impl<K> Default for TokenStore<K> {
    fn default() -> Self {
        Self { session: OnceCell::new(), auth_token: RefCell::new(None) }
    }
}

impl<K: Keyring> TokenStore<K> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Session keyring. `None` until the handshake completes.
    pub fn keyring(&self) -> Option<&K> {
        self.session.get().map(|s| &s.keyring)
    }

    /// Anti-forgery token. `None` until the handshake completes.
    pub fn anti_forgery_token(&self) -> Option<&str> {
        self.session.get().map(|s| s.anti_forgery_token.as_str())
    }

    /// Current authentication token in header-token form. `None` until the
    /// first rotation.
    pub fn auth_token(&self) -> Option<String> {
        self.auth_token.borrow().clone()
    }

    /// Whether the session secrets are installed.
    pub fn is_loaded(&self) -> bool {
        self.session.get().is_some()
    }

    /// Install the session secrets. Handshake only.
    ///
    /// A second install is a programming error: it trips a debug assertion
    /// and leaves the first secrets in place.
    pub(crate) fn install_session(
        &self,
        keyring: K,
        anti_forgery_token: String,
    ) -> Result<(), StoreError> {
        debug_assert!(!self.is_loaded(), "session secrets are write-once");
        self.session
            .set(SessionSecrets { keyring, anti_forgery_token })
            .map_err(|_| StoreError::AlreadyInstalled)
    }

    /// Replace the authentication token. Response interceptor only.
    pub(crate) fn set_auth_token(&self, token: String) {
        *self.auth_token.borrow_mut() = Some(token);
    }
}

impl<K> std::fmt::Debug for TokenStore<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("loaded", &self.session.get().is_some())
            .field("auth_token", &self.auth_token.borrow().as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

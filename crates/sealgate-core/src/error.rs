//! Error types for the Sealgate core.
//!
//! Strongly-typed errors for each layer: crypto façade failures, store
//! invariant violations, readiness timeouts and request signing.
//!
//! Security-filtered input (wrong origin, malformed or duplicate handshake
//! messages) is never an error. Those messages are dropped without a trace
//! visible to the sender.

use std::time::Duration;

use thiserror::Error;

/// Errors reported by a [`crate::CryptoFacade`] or [`crate::Keyring`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Session claims failed verification
    #[error("invalid claims: {reason}")]
    InvalidClaims {
        /// Why the claims were rejected
        reason: String,
    },

    /// Encryption failed
    #[error("encryption failed: {reason}")]
    Encryption {
        /// Reason for failure
        reason: String,
    },

    /// Decryption failed (authentication tag mismatch or wrong key)
    #[error("decryption failed: {reason}")]
    Decryption {
        /// Reason for failure
        reason: String,
    },

    /// Input was not in the expected text encoding
    #[error("encoding error: {reason}")]
    Encoding {
        /// Reason for failure
        reason: String,
    },

    /// The primitives have not finished loading
    #[error("crypto primitives not loaded")]
    NotLoaded,
}

impl CryptoError {
    /// Returns true if this error is fatal for the session.
    ///
    /// Invalid claims permanently strand the handshake. Everything else only
    /// affects the single value being processed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidClaims { .. })
    }
}

/// Token store invariant violations.
///
/// These are programming errors: the handshake is the only writer of the
/// session secrets and it writes them once.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// Keyring and anti-forgery token were already installed
    #[error("session secrets already installed")]
    AlreadyInstalled,
}

/// Readiness gate failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateError {
    /// The primitive did not become ready within the configured timeout
    #[error("primitive not ready after {elapsed:?} ({polls} polls)")]
    TimedOut {
        /// How long we waited
        elapsed: Duration,
        /// How many times the readiness check ran
        polls: u64,
    },
}

impl GateError {
    /// Returns true if waiting again may succeed.
    ///
    /// The primitive may still be loading, so a timeout is transient from
    /// the caller's point of view even though the handshake gives up.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
}

/// Errors from signing an outgoing request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// A request parameter could not be encrypted
    #[error("failed to encrypt parameter {parameter:?}: {source}")]
    Encryption {
        /// Name of the parameter that failed
        parameter: String,
        /// Underlying keyring error
        source: CryptoError,
    },
}

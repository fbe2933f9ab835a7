//! Key material errors.

use sealgate_core::CryptoError;
use thiserror::Error;

/// Errors in the sealed keyring payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyMaterialError {
    /// A secret was not valid hex
    #[error("secret {field} is not hex: {reason}")]
    NotHex {
        /// Which secret (`x` or `y`)
        field: &'static str,
        /// Decoder message
        reason: String,
    },

    /// A secret had the wrong length
    #[error("secret {field} is {actual} bytes, expected {expected}")]
    WrongLength {
        /// Which secret (`x` or `y`)
        field: &'static str,
        /// Required length
        expected: usize,
        /// Length found
        actual: usize,
    },

    /// The sealed payload was not the expected JSON shape
    #[error("malformed keyring payload: {reason}")]
    Malformed {
        /// Parser message
        reason: String,
    },
}

impl From<KeyMaterialError> for CryptoError {
    fn from(err: KeyMaterialError) -> Self {
        CryptoError::InvalidClaims { reason: err.to_string() }
    }
}

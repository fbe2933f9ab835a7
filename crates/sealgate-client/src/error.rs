//! Session runtime errors.

use thiserror::Error;

/// Errors surfaced by [`crate::Session`].
///
/// Everything the handshake filters (wrong origin, malformed, duplicate) is
/// dropped silently and never shows up here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The host failed to deliver an acknowledgment or stop listening
    #[error("host error: {0}")]
    Host(String),
}

impl SessionError {
    /// Wrap a host error.
    pub fn host(err: &impl std::fmt::Display) -> Self {
        Self::Host(err.to_string())
    }
}

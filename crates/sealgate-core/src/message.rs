//! Out-of-band session messages.
//!
//! The parent posts `{ token, pubkey? }` to the embedded context once. The
//! host wraps whatever it receives in an [`InboundMessage`]; only a message
//! from the expected origin whose payload parses as a [`SessionMessage`] can
//! start the handshake.

use serde::Deserialize;

/// Literal acknowledgment posted back to the parent after the handshake.
pub const ACK_MESSAGE: &str = "ack-token";

/// A message as delivered by the host's message channel.
///
/// `S` is the opaque reply handle of the sender (a window proxy in a
/// browser, a test id in simulation).
#[derive(Debug, Clone)]
pub struct InboundMessage<S> {
    /// Origin reported by the channel for the sender
    pub origin: String,
    /// Structured payload
    pub data: serde_json::Value,
    /// Where to send the acknowledgment
    pub source: S,
}

impl<S> InboundMessage<S> {
    /// Create a message as received from `origin`.
    pub fn new(origin: impl Into<String>, data: serde_json::Value, source: S) -> Self {
        Self { origin: origin.into(), data, source }
    }
}

#[derive(Deserialize)]
struct SessionPayload {
    token: String,
    #[serde(default)]
    pubkey: Option<String>,
}

/// Parsed session material.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionMessage {
    /// Origin the message was accepted from
    pub origin_tag: String,
    /// Signed session token
    pub token: String,
    /// Optional server public identity
    pub aux_data: Option<String>,
}

impl SessionMessage {
    /// Parse the payload of `message`. `None` if it is not a session
    /// message; callers drop those without a response.
    pub fn parse<S>(message: &InboundMessage<S>) -> Option<Self> {
        if !message.data.is_object() {
            return None;
        }
        let payload = SessionPayload::deserialize(&message.data).ok()?;
        if payload.token.is_empty() {
            return None;
        }
        Some(Self {
            origin_tag: message.origin.clone(),
            token: payload.token,
            aux_data: payload.pubkey,
        })
    }
}

impl std::fmt::Debug for SessionMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMessage")
            .field("origin_tag", &self.origin_tag)
            .field("token", &"<redacted>")
            .field("aux_data", &self.aux_data)
            .finish()
    }
}

//! Observable state snapshots for invariant checking.
//!
//! Invariants operate on snapshots rather than the live world so every check
//! sees the same instant.

use sealgate_core::HandshakeState;

/// Observable state of one simulated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Current handshake state
    pub state: HandshakeState,
    /// Distinct states in the order they were observed
    pub state_history: Vec<HandshakeState>,
    /// Acknowledgments attempted, refused posts included
    pub acks: usize,
    /// Times the listener was removed
    pub stop_calls: u32,
    /// Whether the message listener is still registered
    pub listening: bool,
    /// Keyrings built by the façade
    pub derivations: u32,
    /// Whether the store holds a keyring
    pub store_loaded: bool,
    /// Whether the store holds an anti-forgery token
    pub anti_forgery_token: bool,
    /// Subscribers registered before the handshake failed
    pub subscribers_registered: u32,
    /// Subscriber invocations so far
    pub subscriber_fires: u32,
    /// Signed requests that still carried a plaintext parameter
    pub plaintext_leaks: u32,
    /// Children of the swap target
    pub target_children: usize,
}

impl SessionSnapshot {
    /// State of a session that has seen nothing yet.
    pub fn fresh() -> Self {
        Self {
            state: HandshakeState::Idle,
            state_history: vec![HandshakeState::Idle],
            acks: 0,
            stop_calls: 0,
            listening: true,
            derivations: 0,
            store_loaded: false,
            anti_forgery_token: false,
            subscribers_registered: 0,
            subscriber_fires: 0,
            plaintext_leaks: 0,
            target_children: 1,
        }
    }

    /// Whether the handshake reached a final state.
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, HandshakeState::Loaded | HandshakeState::Failed)
    }
}

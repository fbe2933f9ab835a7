//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use sealgate_core::HandshakeState;

use super::{Invariant, InvariantResult, SessionSnapshot};

/// The handshake completes at most once.
///
/// At most one acknowledgment is posted and at most one keyring is built,
/// however many session messages arrive. A loaded session has exactly one
/// of each.
pub struct ExactlyOnceHandshake;

impl Invariant for ExactlyOnceHandshake {
    fn name(&self) -> &'static str {
        "exactly_once_handshake"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        if state.acks > 1 || state.derivations > 1 {
            return Err(self.violation(format!(
                "{} acks and {} keyring derivations",
                state.acks, state.derivations
            )));
        }

        let loaded = state.state == HandshakeState::Loaded;
        if loaded != (state.acks == 1) {
            return Err(self.violation(format!(
                "state {:?} with {} acks",
                state.state, state.acks
            )));
        }
        if loaded && state.derivations != 1 {
            return Err(self.violation("loaded without a keyring derivation".to_string()));
        }
        Ok(())
    }
}

/// The store holds secrets exactly when the handshake is loaded.
pub struct StoreMatchesState;

impl Invariant for StoreMatchesState {
    fn name(&self) -> &'static str {
        "store_matches_state"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        let loaded = state.state == HandshakeState::Loaded;
        if state.store_loaded != loaded || state.anti_forgery_token != loaded {
            return Err(self.violation(format!(
                "state {:?}, keyring present {}, anti-forgery token present {}",
                state.state, state.store_loaded, state.anti_forgery_token
            )));
        }
        Ok(())
    }
}

/// The listener stays registered until a final state, then is removed once.
pub struct TerminalStopsListening;

impl Invariant for TerminalStopsListening {
    fn name(&self) -> &'static str {
        "terminal_stops_listening"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        let expected_stops = u32::from(state.is_terminal());
        if state.listening == state.is_terminal() || state.stop_calls != expected_stops {
            return Err(self.violation(format!(
                "state {:?}, listening {}, {} stop calls",
                state.state, state.listening, state.stop_calls
            )));
        }
        Ok(())
    }
}

/// The handshake only moves forward.
///
/// `Idle` precedes `Working`, which precedes the final states. Once `Loaded`
/// or `Failed`, the state never changes again.
pub struct StateMonotonicity;

fn rank(state: HandshakeState) -> u8 {
    match state {
        HandshakeState::Idle => 0,
        HandshakeState::Working => 1,
        HandshakeState::Loaded | HandshakeState::Failed => 2,
    }
}

impl Invariant for StateMonotonicity {
    fn name(&self) -> &'static str {
        "state_monotonicity"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        for window in state.state_history.windows(2) {
            let [from, to] = [window[0], window[1]];
            if rank(to) <= rank(from) {
                return Err(self.violation(format!("state moved {from:?} → {to:?}")));
            }
        }
        if state.state_history.last() != Some(&state.state) {
            return Err(self.violation(format!(
                "current state {:?} missing from history {:?}",
                state.state, state.state_history
            )));
        }
        Ok(())
    }
}

/// Completion subscribers fire exactly once, and only on success.
pub struct SubscribersFireOnce;

impl Invariant for SubscribersFireOnce {
    fn name(&self) -> &'static str {
        "subscribers_fire_once"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        let expected = if state.state == HandshakeState::Loaded {
            state.subscribers_registered
        } else {
            0
        };
        if state.subscriber_fires != expected {
            return Err(self.violation(format!(
                "state {:?}: {} fires for {} subscribers",
                state.state, state.subscriber_fires, state.subscribers_registered
            )));
        }
        Ok(())
    }
}

/// Requests signed after the handshake never carry plaintext parameters.
pub struct NoPlaintextParameters;

impl Invariant for NoPlaintextParameters {
    fn name(&self) -> &'static str {
        "no_plaintext_parameters"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        if state.plaintext_leaks > 0 {
            return Err(self.violation(format!(
                "{} signed requests kept a plaintext parameter",
                state.plaintext_leaks
            )));
        }
        Ok(())
    }
}

/// Swapping into the target replaces its content instead of appending.
pub struct SwapReplacesChildren;

impl Invariant for SwapReplacesChildren {
    fn name(&self) -> &'static str {
        "swap_replaces_children"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        if state.target_children != 1 {
            return Err(self.violation(format!(
                "target has {} children",
                state.target_children
            )));
        }
        Ok(())
    }
}

//! Session handshake state machine.
//!
//! Consumes exactly one valid out-of-band session message, turns it into a
//! keyring and anti-forgery token, and reports completion once. Uses the
//! action pattern: methods take the current instant and return actions for
//! the driver to execute, so the machine itself performs no I/O.
//!
//! # State Machine
//!
//! ```text
//! ┌──────┐  valid message  ┌─────────┐  gate ready + derived  ┌────────┐
//! │ Idle │────────────────>│ Working │───────────────────────>│ Loaded │
//! └──────┘                 └─────────┘                        └────────┘
//!    │ wrong origin /           │ invalid claims /
//!    │ malformed: dropped       │ gate timeout
//!    ↓                          ↓
//! ┌──────┐                 ┌────────┐
//! │ Idle │                 │ Failed │
//! └──────┘                 └────────┘
//! ```
//!
//! `Loaded` and `Failed` are terminal. Every message that arrives outside
//! `Idle` is dropped, which is what makes handshake processing exactly-once
//! under duplicate or replayed delivery: on a single-threaded event loop the
//! `Idle → Working` check-and-set cannot interleave with another delivery.

use std::{ops::Sub, time::Duration};

use crate::{
    config::{GateConfig, SessionConfig},
    error::CryptoError,
    facade::{CryptoFacade, Keyring},
    gate::{GateStatus, ReadinessGate},
    message::{ACK_MESSAGE, InboundMessage, SessionMessage},
    store::TokenStore,
};

/// Actions returned by the handshake state machine.
///
/// The driver executes them in order:
/// - `Acknowledge`: post `message` to `source`, targeting `origin`
/// - `Loaded`: run post-handshake work (e.g. deferred token rotation)
/// - `NotifySubscribers`: call [`Handshake::notify_subscribers`]
/// - `StopListening`: unregister the session message listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeAction<S> {
    /// Acknowledge receipt of the session message
    Acknowledge {
        /// Reply handle of the sender
        source: S,
        /// Origin to target the reply at
        origin: String,
        /// Acknowledgment literal
        message: &'static str,
    },

    /// Keyring and anti-forgery token are installed
    Loaded,

    /// Completion subscribers are due
    NotifySubscribers,

    /// No further session messages will be processed
    StopListening,
}

/// Observable handshake state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// No session message accepted yet
    Idle,
    /// A message was accepted and is waiting on the primitives
    Working,
    /// Session secrets installed (terminal)
    Loaded,
    /// Derivation failed; the session stays unauthenticated (terminal)
    Failed,
}

/// Message accepted into `Working`.
struct Pending<S, I> {
    message: SessionMessage,
    source: S,
    gate: ReadinessGate<I>,
}

enum Phase<S, I> {
    Idle,
    Working(Pending<S, I>),
    Loaded,
    Failed,
}

type Subscriber = Box<dyn FnOnce()>;

/// Handshake state machine.
///
/// Generic over the façade `F`, the reply handle `S` and the instant type
/// `I`, so the same machine runs against real and simulated hosts.
pub struct Handshake<F, S, I>
where
    F: CryptoFacade,
{
    facade: F,
    expected_origin: String,
    gate_config: GateConfig,
    phase: Phase<S, I>,
    subscribers: Vec<Subscriber>,
}

impl<F, S, I> Handshake<F, S, I>
where
    F: CryptoFacade,
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Create a handshake in [`HandshakeState::Idle`].
    pub fn new(config: &SessionConfig, facade: F) -> Self {
        Self {
            facade,
            expected_origin: config.expected_origin.clone(),
            gate_config: config.gate,
            phase: Phase::Idle,
            subscribers: Vec::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> HandshakeState {
        match self.phase {
            Phase::Idle => HandshakeState::Idle,
            Phase::Working(_) => HandshakeState::Working,
            Phase::Loaded => HandshakeState::Loaded,
            Phase::Failed => HandshakeState::Failed,
        }
    }

    /// Origin session messages must come from.
    pub fn expected_origin(&self) -> &str {
        &self.expected_origin
    }

    /// The crypto façade this handshake derives keyrings from.
    pub fn facade(&self) -> &F {
        &self.facade
    }

    /// Register a completion subscriber.
    ///
    /// Subscribers run exactly once, in registration order, when the driver
    /// executes [`HandshakeAction::NotifySubscribers`], or immediately if
    /// that already happened. A failed handshake never loads, so subscribers
    /// registered after failure are dropped without being called.
    pub fn on_loaded(&mut self, callback: impl FnOnce() + 'static) {
        match self.phase {
            Phase::Loaded if self.subscribers.is_empty() => callback(),
            Phase::Loaded => self.subscribers.push(Box::new(callback)),
            Phase::Failed => tracing::debug!("handshake failed, subscriber will never fire"),
            Phase::Idle | Phase::Working(_) => self.subscribers.push(Box::new(callback)),
        }
    }

    /// Process a message from the out-of-band channel.
    ///
    /// Wrong-origin, malformed and duplicate messages are dropped with no
    /// side effect and no acknowledgment. They are never reported as errors:
    /// the sender learns nothing about why it was ignored.
    pub fn receive(
        &mut self,
        message: InboundMessage<S>,
        store: &TokenStore<F::Keyring>,
        now: I,
    ) -> Vec<HandshakeAction<S>> {
        if message.origin != self.expected_origin {
            tracing::debug!(origin = %message.origin, "dropping message from unexpected origin");
            return Vec::new();
        }

        if !matches!(self.phase, Phase::Idle) {
            tracing::debug!(state = ?self.state(), "dropping duplicate session message");
            return Vec::new();
        }

        let Some(session) = SessionMessage::parse(&message) else {
            tracing::debug!(origin = %message.origin, "dropping malformed session message");
            return Vec::new();
        };

        tracing::debug!(origin = %session.origin_tag, "session message accepted");
        self.phase = Phase::Working(Pending {
            message: session,
            source: message.source,
            gate: ReadinessGate::new(now, self.gate_config.timeout),
        });

        self.advance(store, now)
    }

    /// Per-frame poll. Completes a `Working` handshake once the primitives
    /// are loaded. No-op in every other state.
    pub fn tick(&mut self, store: &TokenStore<F::Keyring>, now: I) -> Vec<HandshakeAction<S>> {
        self.advance(store, now)
    }

    fn advance(&mut self, store: &TokenStore<F::Keyring>, now: I) -> Vec<HandshakeAction<S>> {
        let status = match &mut self.phase {
            Phase::Working(pending) => {
                let facade = &self.facade;
                pending.gate.poll(now, || facade.is_loaded())
            },
            Phase::Idle | Phase::Loaded | Phase::Failed => return Vec::new(),
        };

        match status {
            GateStatus::Pending | GateStatus::Spent => Vec::new(),
            GateStatus::TimedOut { elapsed, polls } => {
                tracing::warn!(?elapsed, polls, "crypto primitives never loaded");
                self.fail()
            },
            GateStatus::Ready => match std::mem::replace(&mut self.phase, Phase::Failed) {
                Phase::Working(pending) => self.complete(pending, store),
                other => {
                    self.phase = other;
                    Vec::new()
                },
            },
        }
    }

    fn complete(
        &mut self,
        pending: Pending<S, I>,
        store: &TokenStore<F::Keyring>,
    ) -> Vec<HandshakeAction<S>> {
        let (keyring, anti_forgery_token) = match self.derive(&pending.message) {
            Ok(derived) => derived,
            Err(err) => {
                if err.is_fatal() {
                    tracing::warn!(error = %err, "session claims rejected");
                } else {
                    tracing::error!(error = %err, "session keyring derivation failed");
                }
                return self.fail();
            },
        };

        if let Err(err) = store.install_session(keyring, anti_forgery_token) {
            tracing::warn!(error = %err, "token store rejected session secrets");
            return self.fail();
        }

        self.phase = Phase::Loaded;
        tracing::info!(origin = %pending.message.origin_tag, "session handshake complete");

        vec![
            HandshakeAction::Acknowledge {
                source: pending.source,
                origin: pending.message.origin_tag,
                message: ACK_MESSAGE,
            },
            HandshakeAction::Loaded,
            HandshakeAction::NotifySubscribers,
            HandshakeAction::StopListening,
        ]
    }

    /// Run pending completion subscribers, in registration order.
    ///
    /// Returns how many ran. No-op unless the handshake is `Loaded`.
    pub fn notify_subscribers(&mut self) -> usize {
        if !matches!(self.phase, Phase::Loaded) {
            return 0;
        }
        let subscribers = std::mem::take(&mut self.subscribers);
        let count = subscribers.len();
        for subscriber in subscribers {
            subscriber();
        }
        count
    }

    fn derive(&self, message: &SessionMessage) -> Result<(F::Keyring, String), CryptoError> {
        let claims = self.facade.verify_claims(
            &message.origin_tag,
            &message.token,
            message.aux_data.as_deref(),
        )?;
        let keyring = self.facade.keyring(claims)?;
        let anti_forgery_token = keyring.encrypt_header(&message.token)?;
        Ok((keyring, anti_forgery_token))
    }

    fn fail(&mut self) -> Vec<HandshakeAction<S>> {
        self.phase = Phase::Failed;
        let dropped = std::mem::take(&mut self.subscribers).len();
        if dropped > 0 {
            tracing::debug!(dropped, "discarding subscribers of failed handshake");
        }
        vec![HandshakeAction::StopListening]
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use serde_json::json;

    use super::*;
    use crate::facade::testing::{ReversingKeyring, TestFacade};

    const ORIGIN: &str = "https://parent";

    type TestHandshake = Handshake<TestFacade, u32, Duration>;

    fn handshake(facade: TestFacade) -> TestHandshake {
        Handshake::new(&SessionConfig::new(ORIGIN), facade)
    }

    fn session_message(origin: &str, source: u32) -> InboundMessage<u32> {
        InboundMessage::new(origin, json!({ "token": "abc" }), source)
    }

    #[test]
    fn handshake_lifecycle() {
        let store = TokenStore::new();
        let mut hs = handshake(TestFacade::loaded());
        assert_eq!(hs.state(), HandshakeState::Idle);

        let actions = hs.receive(session_message(ORIGIN, 7), &store, Duration::ZERO);

        assert_eq!(hs.state(), HandshakeState::Loaded);
        assert_eq!(actions, vec![
            HandshakeAction::Acknowledge {
                source: 7,
                origin: ORIGIN.to_string(),
                message: ACK_MESSAGE,
            },
            HandshakeAction::Loaded,
            HandshakeAction::NotifySubscribers,
            HandshakeAction::StopListening,
        ]);
        assert_eq!(
            store.anti_forgery_token(),
            Some(ReversingKeyring::default().encrypt_header("abc").unwrap().as_str())
        );
    }

    #[test]
    fn duplicate_message_is_dropped() {
        let store = TokenStore::new();
        let facade = TestFacade::loaded();
        let mut hs = handshake(facade.clone());

        hs.receive(session_message(ORIGIN, 1), &store, Duration::ZERO);
        let actions = hs.receive(session_message(ORIGIN, 2), &store, Duration::ZERO);

        assert!(actions.is_empty());
        assert_eq!(facade.keyrings_built.get(), 1);
    }

    #[test]
    fn wrong_origin_is_dropped_silently() {
        let store = TokenStore::new();
        let mut hs = handshake(TestFacade::loaded());

        let actions = hs.receive(session_message("https://evil", 1), &store, Duration::ZERO);

        assert!(actions.is_empty());
        assert_eq!(hs.state(), HandshakeState::Idle);
        assert!(!store.is_loaded());
    }

    #[test]
    fn malformed_message_keeps_listening() {
        let store = TokenStore::new();
        let mut hs = handshake(TestFacade::loaded());

        let junk = InboundMessage::new(ORIGIN, json!({ "nope": true }), 1);
        assert!(hs.receive(junk, &store, Duration::ZERO).is_empty());
        assert_eq!(hs.state(), HandshakeState::Idle);

        let actions = hs.receive(session_message(ORIGIN, 2), &store, Duration::ZERO);
        assert_eq!(actions.len(), 4);
        assert_eq!(hs.state(), HandshakeState::Loaded);
    }

    #[test]
    fn waits_for_primitives_across_ticks() {
        let store = TokenStore::new();
        let facade = TestFacade::default();
        let mut hs = handshake(facade.clone());

        assert!(hs.receive(session_message(ORIGIN, 1), &store, Duration::ZERO).is_empty());
        assert_eq!(hs.state(), HandshakeState::Working);

        assert!(hs.tick(&store, Duration::from_millis(16)).is_empty());
        assert!(!store.is_loaded());

        facade.loaded.set(true);
        let actions = hs.tick(&store, Duration::from_millis(32));
        assert_eq!(actions.len(), 4);
        assert_eq!(hs.state(), HandshakeState::Loaded);
        assert!(store.is_loaded());

        // Terminal: further ticks do nothing
        assert!(hs.tick(&store, Duration::from_millis(48)).is_empty());
    }

    #[test]
    fn duplicate_while_working_is_dropped() {
        let store = TokenStore::new();
        let facade = TestFacade::default();
        let mut hs = handshake(facade.clone());

        hs.receive(session_message(ORIGIN, 1), &store, Duration::ZERO);
        assert!(hs.receive(session_message(ORIGIN, 2), &store, Duration::ZERO).is_empty());

        facade.loaded.set(true);
        let actions = hs.tick(&store, Duration::from_millis(16));
        assert!(matches!(actions[0], HandshakeAction::Acknowledge { source: 1, .. }));
        assert_eq!(facade.keyrings_built.get(), 1);
    }

    #[test]
    fn invalid_claims_strand_the_session() {
        let store = TokenStore::new();
        let facade = TestFacade { reject_claims: true, ..TestFacade::loaded() };
        let mut hs = handshake(facade);

        let actions = hs.receive(session_message(ORIGIN, 1), &store, Duration::ZERO);

        assert_eq!(actions, vec![HandshakeAction::StopListening]);
        assert_eq!(hs.state(), HandshakeState::Failed);
        assert!(!store.is_loaded());

        // No retry on a new message
        assert!(hs.receive(session_message(ORIGIN, 2), &store, Duration::ZERO).is_empty());
        assert_eq!(hs.state(), HandshakeState::Failed);
    }

    #[test]
    fn gate_timeout_fails_the_handshake() {
        let store = TokenStore::new();
        let config = SessionConfig::new(ORIGIN).with_gate(GateConfig {
            timeout: Some(Duration::from_secs(1)),
            ..GateConfig::default()
        });
        let mut hs: TestHandshake = Handshake::new(&config, TestFacade::default());

        hs.receive(session_message(ORIGIN, 1), &store, Duration::ZERO);
        assert!(hs.tick(&store, Duration::from_millis(500)).is_empty());

        let actions = hs.tick(&store, Duration::from_secs(2));
        assert_eq!(actions, vec![HandshakeAction::StopListening]);
        assert_eq!(hs.state(), HandshakeState::Failed);
    }

    #[test]
    fn subscribers_fire_once_in_order() {
        let store = TokenStore::new();
        let facade = TestFacade::default();
        let mut hs = handshake(facade.clone());
        let log = Rc::new(RefCell::new(Vec::new()));

        for id in 0..3 {
            let log = Rc::clone(&log);
            hs.on_loaded(move || log.borrow_mut().push(id));
        }

        hs.receive(session_message(ORIGIN, 1), &store, Duration::ZERO);
        assert!(log.borrow().is_empty());

        facade.loaded.set(true);
        let actions = hs.tick(&store, Duration::from_millis(16));
        assert!(actions.contains(&HandshakeAction::NotifySubscribers));
        assert!(log.borrow().is_empty());

        assert_eq!(hs.notify_subscribers(), 3);
        hs.tick(&store, Duration::from_millis(32));
        assert_eq!(hs.notify_subscribers(), 0);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn subscribers_wait_for_the_notify_action() {
        let store = TokenStore::new();
        let mut hs = handshake(TestFacade::loaded());
        let log = Rc::new(RefCell::new(Vec::new()));

        let early = Rc::clone(&log);
        hs.on_loaded(move || early.borrow_mut().push("early"));

        let actions = hs.receive(session_message(ORIGIN, 1), &store, Duration::ZERO);
        let notify = actions.iter().position(|a| *a == HandshakeAction::NotifySubscribers);
        let ack = actions.iter().position(|a| matches!(a, HandshakeAction::Acknowledge { .. }));
        let loaded = actions.iter().position(|a| *a == HandshakeAction::Loaded);
        assert!(ack < loaded && loaded < notify);

        // Registered between completion and notification: queued behind
        let late = Rc::clone(&log);
        hs.on_loaded(move || late.borrow_mut().push("late"));
        assert!(log.borrow().is_empty());

        hs.notify_subscribers();
        assert_eq!(*log.borrow(), vec!["early", "late"]);
    }

    #[test]
    fn notify_before_load_runs_nothing() {
        let mut hs = handshake(TestFacade::default());
        let fired = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&fired);
        hs.on_loaded(move || *flag.borrow_mut() = true);

        assert_eq!(hs.notify_subscribers(), 0);
        assert!(!*fired.borrow());
    }

    #[test]
    fn subscriber_sees_installed_secrets() {
        let store = Rc::new(TokenStore::<ReversingKeyring>::new());
        let mut hs = handshake(TestFacade::loaded());
        let seen = Rc::new(RefCell::new(None));

        {
            let store = Rc::clone(&store);
            let seen = Rc::clone(&seen);
            hs.on_loaded(move || {
                *seen.borrow_mut() = store.anti_forgery_token().map(str::to_string);
            });
        }

        hs.receive(session_message(ORIGIN, 1), &store, Duration::ZERO);
        hs.notify_subscribers();
        assert!(seen.borrow().is_some());
    }

    #[test]
    fn late_subscriber_fires_immediately() {
        let store = TokenStore::new();
        let mut hs = handshake(TestFacade::loaded());
        hs.receive(session_message(ORIGIN, 1), &store, Duration::ZERO);

        let fired = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&fired);
        hs.on_loaded(move || *counter.borrow_mut() += 1);

        assert_eq!(*fired.borrow(), 1);
    }

    #[test]
    fn subscriber_on_failed_handshake_never_fires() {
        let store = TokenStore::new();
        let facade = TestFacade { reject_claims: true, ..TestFacade::loaded() };
        let mut hs = handshake(facade);
        hs.receive(session_message(ORIGIN, 1), &store, Duration::ZERO);

        let fired = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&fired);
        hs.on_loaded(move || *flag.borrow_mut() = true);

        assert!(!*fired.borrow());
    }
}

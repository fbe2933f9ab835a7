//! Property tests for the session handshake.
//!
//! These tests verify critical invariants:
//! - Duplicate or replayed session messages derive the keyring at most once
//! - Wrong-origin and malformed messages never touch the token store
//! - Subscribers fire exactly once, after the secrets are installed
//! - Request signing only ever exposes parameters in encrypted form

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
    time::Duration,
};

use proptest::prelude::*;
use sealgate_core::{
    ConfigRequest, CryptoError, CryptoFacade, Handshake, HandshakeAction, HandshakeState,
    InboundMessage, Keyring, RequestInterceptor, SessionConfig, TokenStore,
};
use serde_json::json;

const ORIGIN: &str = "https://parent";

/// Adds one to every byte and hex-encodes. Never maps input to itself.
#[derive(Debug, Clone)]
struct ShiftKeyring;

impl ShiftKeyring {
    fn seal(value: &str) -> String {
        value.bytes().map(|b| format!("{:02x}", b.wrapping_add(1))).collect()
    }

    fn open(value: &str) -> Result<String, CryptoError> {
        let bytes = (0..value.len())
            .step_by(2)
            .map(|i| {
                value
                    .get(i..i + 2)
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                    .map(|b| b.wrapping_sub(1))
            })
            .collect::<Option<Vec<u8>>>()
            .ok_or_else(|| CryptoError::Decryption { reason: "not hex".to_string() })?;
        String::from_utf8(bytes).map_err(|e| CryptoError::Decryption { reason: e.to_string() })
    }
}

impl Keyring for ShiftKeyring {
    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        Ok(Self::seal(plaintext))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        Self::open(ciphertext)
    }

    fn encrypt_header(&self, value: &str) -> Result<String, CryptoError> {
        Ok(Self::seal(value))
    }

    fn decrypt_header(&self, token: &str) -> Result<String, CryptoError> {
        Self::open(token)
    }
}

#[derive(Debug, Clone, Default)]
struct CountingFacade {
    loaded: Rc<Cell<bool>>,
    derived: Rc<Cell<u32>>,
}

impl CryptoFacade for CountingFacade {
    type Claims = ();
    type Keyring = ShiftKeyring;

    fn is_loaded(&self) -> bool {
        self.loaded.get()
    }

    fn verify_claims(&self, _: &str, _: &str, _: Option<&str>) -> Result<(), CryptoError> {
        Ok(())
    }

    fn keyring(&self, (): ()) -> Result<ShiftKeyring, CryptoError> {
        self.derived.set(self.derived.get() + 1);
        Ok(ShiftKeyring)
    }
}

/// One delivery on the out-of-band channel.
#[derive(Debug, Clone)]
enum Delivery {
    Valid { source: u8 },
    WrongOrigin { source: u8 },
    Malformed { source: u8 },
    Tick,
    PrimitivesLoad,
}

fn delivery_strategy() -> impl Strategy<Value = Delivery> {
    prop_oneof![
        3 => any::<u8>().prop_map(|source| Delivery::Valid { source }),
        2 => any::<u8>().prop_map(|source| Delivery::WrongOrigin { source }),
        2 => any::<u8>().prop_map(|source| Delivery::Malformed { source }),
        2 => Just(Delivery::Tick),
        1 => Just(Delivery::PrimitivesLoad),
    ]
}

fn count_acks(actions: &[HandshakeAction<u8>]) -> usize {
    actions.iter().filter(|a| matches!(a, HandshakeAction::Acknowledge { .. })).count()
}

proptest! {
    /// INVARIANT: whatever arrives, at most one ack and one derivation, and
    /// the store is loaded iff the handshake is.
    #[test]
    fn exactly_once_under_any_delivery_order(
        deliveries in prop::collection::vec(delivery_strategy(), 0..40)
    ) {
        let facade = CountingFacade::default();
        let store = TokenStore::new();
        let mut hs: Handshake<_, u8, Duration> =
            Handshake::new(&SessionConfig::new(ORIGIN), facade.clone());

        let mut acks = 0;
        let mut now = Duration::ZERO;
        let mut saw_valid = false;

        for delivery in deliveries {
            now += Duration::from_millis(16);
            let actions = match delivery {
                Delivery::Valid { source } => {
                    saw_valid = true;
                    hs.receive(InboundMessage::new(ORIGIN, json!({ "token": "abc" }), source), &store, now)
                },
                Delivery::WrongOrigin { source } => hs.receive(
                    InboundMessage::new("https://evil", json!({ "token": "abc" }), source),
                    &store,
                    now,
                ),
                Delivery::Malformed { source } => {
                    hs.receive(InboundMessage::new(ORIGIN, json!({ "tok": 1 }), source), &store, now)
                },
                Delivery::Tick => hs.tick(&store, now),
                Delivery::PrimitivesLoad => {
                    facade.loaded.set(true);
                    Vec::new()
                },
            };
            acks += count_acks(&actions);
        }

        prop_assert!(acks <= 1);
        prop_assert!(facade.derived.get() <= 1);
        prop_assert_eq!(store.is_loaded(), hs.state() == HandshakeState::Loaded);
        prop_assert_eq!(acks == 1, hs.state() == HandshakeState::Loaded);
        if !saw_valid {
            prop_assert_eq!(hs.state(), HandshakeState::Idle);
        }
    }

    /// INVARIANT: messages from any other origin never modify the store.
    #[test]
    fn foreign_origins_never_touch_the_store(
        origin in "https?://[a-z]{1,12}(:[0-9]{2,4})?",
        token in "[a-zA-Z0-9]{1,32}",
    ) {
        prop_assume!(origin != ORIGIN);
        let facade = CountingFacade { loaded: Rc::new(Cell::new(true)), ..CountingFacade::default() };
        let store = TokenStore::new();
        let mut hs: Handshake<_, u8, Duration> =
            Handshake::new(&SessionConfig::new(ORIGIN), facade.clone());

        let actions = hs.receive(InboundMessage::new(origin, json!({ "token": token }), 0), &store, Duration::ZERO);

        prop_assert!(actions.is_empty());
        prop_assert!(!store.is_loaded());
        prop_assert!(store.auth_token().is_none());
        prop_assert_eq!(facade.derived.get(), 0);
    }

    /// INVARIANT: after the handshake, every non-empty parameter leaves in
    /// encrypted form and the anti-forgery header is always attached.
    #[test]
    fn signed_parameters_are_never_plaintext(
        parameters in prop::collection::btree_map("[a-z]{1,8}", "[ -~]{1,24}", 0..8)
    ) {
        let facade = CountingFacade { loaded: Rc::new(Cell::new(true)), ..CountingFacade::default() };
        let store = TokenStore::new();
        let mut hs: Handshake<_, u8, Duration> = Handshake::new(&SessionConfig::new(ORIGIN), facade);
        hs.receive(InboundMessage::new(ORIGIN, json!({ "token": "abc" }), 0), &store, Duration::ZERO);

        let mut request = ConfigRequest::new("post", "/submit");
        request.parameters = parameters.clone();
        let signed = RequestInterceptor::default().sign(&store, &mut request)?;

        prop_assert!(signed.anti_forgery_token);
        prop_assert!(request.headers.contains("x-anti-forgery-token"));
        prop_assert_eq!(signed.encrypted_parameters, parameters.len());
        for (name, value) in &parameters {
            let sealed = &request.parameters[name];
            prop_assert_ne!(sealed, value);
            prop_assert_eq!(&ShiftKeyring.decrypt(sealed)?, value);
        }
    }
}

/// INVARIANT: subscribers registered before completion observe installed
/// secrets and run exactly once; late subscribers run immediately.
#[test]
fn subscribers_observe_installed_secrets() {
    let facade = CountingFacade::default();
    let store = Rc::new(TokenStore::<ShiftKeyring>::new());
    let mut hs: Handshake<_, u8, Duration> =
        Handshake::new(&SessionConfig::new(ORIGIN), facade.clone());
    let observed = Rc::new(RefCell::new(Vec::new()));

    {
        let store = Rc::clone(&store);
        let observed = Rc::clone(&observed);
        hs.on_loaded(move || observed.borrow_mut().push(store.anti_forgery_token().is_some()));
    }

    hs.receive(InboundMessage::new(ORIGIN, json!({ "token": "abc" }), 1), &store, Duration::ZERO);
    assert!(observed.borrow().is_empty(), "must not fire while primitives are loading");

    facade.loaded.set(true);
    for frame in 1..5 {
        let actions = hs.tick(&store, Duration::from_millis(16 * frame));
        if actions.contains(&HandshakeAction::NotifySubscribers) {
            assert!(observed.borrow().is_empty(), "must not fire before the driver notifies");
            assert_eq!(hs.notify_subscribers(), 1);
        }
    }

    {
        let observed = Rc::clone(&observed);
        hs.on_loaded(move || observed.borrow_mut().push(true));
    }

    assert_eq!(*observed.borrow(), vec![true, true]);
}

//! Simulated world: one session, its host, its page and the server side of
//! its channel.

use std::{cell::Cell, rc::Rc, time::Duration};

use sealgate_client::{RequestDisposition, Session, SessionError};
use sealgate_core::{
    BeforeSwap, ConfigRequest, GateConfig, HandshakeState, InboundMessage, Keyring, ResponseHead,
    SessionConfig, SwapOutcome, UiEngine, config::DEFAULT_FRAME_INTERVAL,
};
use serde_json::{Value, json};

use crate::{
    fake::{FakeFacade, FakeKeyring},
    invariants::SessionSnapshot,
    operation::{Operation, OriginChoice, PayloadChoice},
    sim_dom::{NodeId, SimDom},
    sim_env::SimEnv,
    sim_host::{SimHost, SourceId},
};

/// Origin of the simulated embedding parent.
pub const PARENT_ORIGIN: &str = "https://parent";

/// Session token the parent delivers.
pub const SESSION_TOKEN: &str = "abc";

const FOREIGN_ORIGIN: &str = "https://attacker.test";
const INITIAL_MARKUP: &str = "<p>loading</p>";

/// A session wired to simulated host, page and crypto.
pub struct SimWorld {
    env: SimEnv,
    facade: FakeFacade,
    session: Session<FakeFacade, SimHost, SimEnv>,
    dom: SimDom,
    target: NodeId,
    server: FakeKeyring,
    subscribers_registered: u32,
    subscriber_fires: Rc<Cell<u32>>,
    state_history: Vec<HandshakeState>,
    plaintext_leaks: u32,
    responses: u32,
}

impl SimWorld {
    /// World with default configuration and no gate timeout.
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, &SessionConfig::new(PARENT_ORIGIN))
    }

    /// World whose crypto primitives are already loaded.
    pub fn preloaded(seed: u64) -> Self {
        let world = Self::new(seed);
        world.facade.mark_loaded();
        world
    }

    /// World whose readiness gate gives up after `timeout`.
    pub fn with_gate_timeout(seed: u64, timeout: Duration) -> Self {
        let config = SessionConfig::new(PARENT_ORIGIN)
            .with_gate(GateConfig { timeout: Some(timeout), ..GateConfig::default() });
        Self::with_config(seed, &config)
    }

    /// World with an explicit session configuration.
    pub fn with_config(seed: u64, config: &SessionConfig) -> Self {
        Self::with_host(seed, config, SimHost::new())
    }

    /// World whose session talks to `host`.
    pub fn with_host(seed: u64, config: &SessionConfig, host: SimHost) -> Self {
        let env = SimEnv::with_seed(seed);
        let facade = FakeFacade::new();
        let session = Session::new(config, facade.clone(), host, env.clone());

        let mut dom = SimDom::new();
        let target = dom.create_element("");
        let initial = dom.create_element(INITIAL_MARKUP);
        dom.append_child(&target, initial);

        Self {
            env,
            facade,
            session,
            dom,
            target,
            server: FakeKeyring::for_token(SESSION_TOKEN),
            subscribers_registered: 0,
            subscriber_fires: Rc::new(Cell::new(0)),
            state_history: vec![HandshakeState::Idle],
            plaintext_leaks: 0,
            responses: 0,
        }
    }

    /// The session under test.
    pub fn session(&self) -> &Session<FakeFacade, SimHost, SimEnv> {
        &self.session
    }

    /// The page.
    pub fn dom(&self) -> &SimDom {
        &self.dom
    }

    /// Element responses are swapped into.
    pub fn target(&self) -> NodeId {
        self.target
    }

    /// Server side of the session's channel.
    pub fn server(&self) -> FakeKeyring {
        self.server
    }

    /// The environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Apply one operation.
    ///
    /// State is recorded even when the host fails, since the session keeps
    /// going after a refused post.
    ///
    /// # Errors
    ///
    /// - `SessionError::Host` if the simulated host refuses a post
    pub fn apply(&mut self, op: Operation) -> Result<(), SessionError> {
        tracing::trace!(?op, "apply");
        let result = match op {
            Operation::Deliver { origin, payload, source } => {
                self.session.handle_message(message(origin, payload, source))
            },
            Operation::Tick => {
                self.env.advance(DEFAULT_FRAME_INTERVAL);
                self.session.tick()
            },
            Operation::AdvanceTime { millis } => {
                self.env.advance(Duration::from_millis(u64::from(millis)));
                Ok(())
            },
            Operation::LoadPrimitives => {
                self.facade.mark_loaded();
                Ok(())
            },
            Operation::Subscribe => {
                self.subscribe();
                Ok(())
            },
            Operation::Request { value } => {
                self.request(value);
                Ok(())
            },
            Operation::Response { rotate, fragment } => {
                self.respond(rotate, fragment);
                Ok(())
            },
            Operation::HostRefuses => {
                self.session.host_mut().refuse_posts();
                Ok(())
            },
        };
        self.record_state();
        result
    }

    /// Apply operations in order, stopping at the first error.
    ///
    /// # Errors
    ///
    /// - `SessionError::Host` if the simulated host refuses a post
    pub fn apply_all(&mut self, ops: impl IntoIterator<Item = Operation>) -> Result<(), SessionError> {
        for op in ops {
            self.apply(op)?;
        }
        Ok(())
    }

    /// Register a subscriber that counts its invocations.
    pub fn subscribe(&mut self) {
        if self.session.state() != HandshakeState::Failed {
            self.subscribers_registered += 1;
        }
        let fires = Rc::clone(&self.subscriber_fires);
        self.session.on_loaded(move || fires.set(fires.get() + 1));
    }

    /// Send a request with parameter `secret = value-<n>`.
    pub fn request(&mut self, value: u8) -> RequestDisposition {
        let plaintext = format!("value-{value}");
        let mut request = ConfigRequest::new("post", "/submit").with_parameter("secret", &plaintext);
        let was_loaded = self.session.store().is_loaded();

        let disposition = self.session.before_request(&mut request);

        if was_loaded
            && matches!(disposition, RequestDisposition::Proceed(_))
            && request.parameters.get("secret") == Some(&plaintext)
        {
            self.plaintext_leaks += 1;
        }
        disposition
    }

    /// Deliver a server response to the swap target.
    pub fn respond(&mut self, rotate: bool, fragment: bool) -> SwapOutcome {
        self.responses += 1;
        let n = self.responses;

        let mut head = ResponseHead { status: 200, ..ResponseHead::default() };
        if rotate && let Ok(token) = self.server.encrypt_header(&format!("jwt-{n}")) {
            head.headers.insert("x-auth-token", token);
        }

        let markup = format!("<p>response {n}</p>");
        let body = match self.server.encrypt(&markup) {
            Ok(sealed) if fragment => json!({ "fragment": sealed }).to_string(),
            _ => markup,
        };

        let mut swap = BeforeSwap::new(head, self.target, body);
        let outcome = self.session.before_swap(&mut self.dom, &mut swap);

        if swap.should_swap {
            let plain = self.dom.create_container(&swap.server_response);
            self.dom.clear_children(&self.target);
            self.dom.append_child(&self.target, plain);
        }
        outcome
    }

    /// Observable state for invariant checks.
    pub fn snapshot(&self) -> SessionSnapshot {
        let store = self.session.store();
        SessionSnapshot {
            state: self.session.state(),
            state_history: self.state_history.clone(),
            acks: self.session.host().acks().len() + self.session.host().refused() as usize,
            stop_calls: self.session.host().stop_calls(),
            listening: self.session.is_listening(),
            derivations: self.facade.derivations(),
            store_loaded: store.is_loaded(),
            anti_forgery_token: store.anti_forgery_token().is_some(),
            subscribers_registered: self.subscribers_registered,
            subscriber_fires: self.subscriber_fires.get(),
            plaintext_leaks: self.plaintext_leaks,
            target_children: self.dom.children(self.target).len(),
        }
    }

    fn record_state(&mut self) {
        let state = self.session.state();
        if self.state_history.last() != Some(&state) {
            self.state_history.push(state);
        }
    }
}

fn message(origin: OriginChoice, payload: PayloadChoice, source: u8) -> InboundMessage<SourceId> {
    let origin = match origin {
        OriginChoice::Parent => PARENT_ORIGIN.to_string(),
        OriginChoice::ParentWithSlash => format!("{PARENT_ORIGIN}/"),
        OriginChoice::Foreign => FOREIGN_ORIGIN.to_string(),
    };
    let data = match payload {
        PayloadChoice::Valid => json!({ "token": SESSION_TOKEN }),
        PayloadChoice::WithPubkey => json!({ "token": SESSION_TOKEN, "pubkey": "server" }),
        PayloadChoice::Rejected => json!({ "token": "bad-token" }),
        PayloadChoice::MissingToken => json!({}),
        PayloadChoice::EmptyToken => json!({ "token": "" }),
        PayloadChoice::NotObject => Value::String(SESSION_TOKEN.to_string()),
    };
    InboundMessage::new(origin, data, SourceId(source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_world_is_idle_and_listening() {
        let world = SimWorld::new(1);
        let snapshot = world.snapshot();

        assert_eq!(snapshot.state, HandshakeState::Idle);
        assert!(snapshot.listening);
        assert_eq!(snapshot.target_children, 1);
        assert_eq!(world.dom().render(world.target()), INITIAL_MARKUP);
    }

    #[test]
    fn plain_response_swaps_normally() {
        let mut world = SimWorld::new(1);
        assert_eq!(world.respond(false, false), SwapOutcome::PassThrough);
        assert_eq!(world.dom().render(world.target()), "<p>response 1</p>");
    }
}

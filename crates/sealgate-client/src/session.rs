//! Session runtime.
//!
//! Owns the per-page state and turns the sans-IO core into something a host
//! can call from its event handlers. The handshake decides; the session
//! executes.

use std::rc::Rc;

use sealgate_core::{
    BeforeSwap, ConfigRequest, CryptoFacade, Environment, GateConfig, Handshake, HandshakeAction,
    HandshakeState, InboundMessage, RequestInterceptor, ResponseInterceptor, SessionConfig,
    SignedRequest, SwapOutcome, TokenStore, UiEngine, await_primitive,
};

use crate::{error::SessionError, host::Host};

/// What the UI engine should do with a signed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDisposition {
    /// Send it
    Proceed(SignedRequest),
    /// Drop it; sending would leak plaintext parameters
    Cancel,
}

/// One embedded session.
///
/// # Type Parameters
///
/// - `F`: crypto façade the handshake derives keyrings from
/// - `H`: host owning the out-of-band message channel
/// - `E`: environment supplying time
pub struct Session<F, H, E>
where
    F: CryptoFacade,
    H: Host,
    E: Environment,
{
    env: E,
    host: H,
    gate: GateConfig,
    store: Rc<TokenStore<F::Keyring>>,
    handshake: Handshake<F, H::Source, E::Instant>,
    requests: RequestInterceptor,
    responses: ResponseInterceptor,
    listening: bool,
}

impl<F, H, E> Session<F, H, E>
where
    F: CryptoFacade,
    H: Host,
    E: Environment,
{
    /// Create a session listening for its handshake message.
    pub fn new(config: &SessionConfig, facade: F, host: H, env: E) -> Self {
        Self {
            env,
            host,
            gate: config.gate,
            store: Rc::new(TokenStore::new()),
            handshake: Handshake::new(config, facade),
            requests: RequestInterceptor::new(config.headers.clone()),
            responses: ResponseInterceptor::new(config.headers.clone()),
            listening: true,
        }
    }

    /// Current handshake state.
    pub fn state(&self) -> HandshakeState {
        self.handshake.state()
    }

    /// Session token store.
    pub fn store(&self) -> &TokenStore<F::Keyring> {
        &self.store
    }

    /// Shared handle to the token store, for completion subscribers.
    pub fn store_handle(&self) -> Rc<TokenStore<F::Keyring>> {
        Rc::clone(&self.store)
    }

    /// Whether the message listener is still registered.
    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// The host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable access to the host.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Register a handshake completion subscriber.
    pub fn on_loaded(&mut self, callback: impl FnOnce() + 'static) {
        self.handshake.on_loaded(callback);
    }

    /// Feed a message from the out-of-band channel.
    ///
    /// Every resulting action runs even when the host fails one of them.
    ///
    /// # Errors
    ///
    /// - `SessionError::Host` with the first host failure
    pub fn handle_message(&mut self, message: InboundMessage<H::Source>) -> Result<(), SessionError> {
        if !self.listening {
            tracing::trace!("listener removed, ignoring message");
            return Ok(());
        }
        let actions = self.handshake.receive(message, &self.store, self.env.now());
        self.execute(actions)
    }

    /// Per-frame poll. Call once per animation frame while
    /// [`HandshakeState::Working`].
    ///
    /// # Errors
    ///
    /// - `SessionError::Host` if acknowledging or unregistering fails
    pub fn tick(&mut self) -> Result<(), SessionError> {
        let actions = self.handshake.tick(&self.store, self.env.now());
        self.execute(actions)
    }

    /// Wait for the crypto primitives and finish a pending handshake.
    ///
    /// For hosts that run an async executor instead of an animation frame
    /// loop. Returns immediately unless the handshake is `Working`.
    ///
    /// # Errors
    ///
    /// - `SessionError::Host` if acknowledging or unregistering fails
    pub async fn settle(&mut self) -> Result<HandshakeState, SessionError> {
        if self.handshake.state() == HandshakeState::Working {
            let facade = self.handshake.facade();
            if let Err(err) =
                await_primitive(&self.env, &self.gate, || facade.is_loaded(), || {}).await
            {
                if err.is_transient() {
                    tracing::info!(error = %err, "stopped waiting for crypto primitives");
                } else {
                    tracing::warn!(error = %err, "crypto primitive gate failed");
                }
            }
            self.tick()?;
        }
        Ok(self.handshake.state())
    }

    /// "Configure request" hook.
    ///
    /// Cancels the request if a parameter cannot be encrypted.
    pub fn before_request(&self, request: &mut ConfigRequest) -> RequestDisposition {
        match self.requests.sign(&self.store, request) {
            Ok(signed) => RequestDisposition::Proceed(signed),
            Err(err) => {
                tracing::warn!(error = %err, path = %request.path, "cancelling request");
                RequestDisposition::Cancel
            },
        }
    }

    /// "Before swap" hook.
    pub fn before_swap<U: UiEngine>(
        &mut self,
        engine: &mut U,
        swap: &mut BeforeSwap<U::Element>,
    ) -> SwapOutcome {
        self.responses.intercept(&self.store, engine, swap).swap
    }

    /// Run every action in order.
    ///
    /// A host failure does not stop the remaining actions: the handshake has
    /// already moved on, so deferred rotation, subscribers and listener
    /// removal must still happen. The first host error is returned.
    fn execute(&mut self, actions: Vec<HandshakeAction<H::Source>>) -> Result<(), SessionError> {
        let mut first_error = None;

        for action in actions {
            let result = match action {
                HandshakeAction::Acknowledge { source, origin, message } => self
                    .host
                    .post_message(&source, message, &origin)
                    .map_err(|e| SessionError::host(&e)),
                HandshakeAction::Loaded => {
                    let rotation = self.responses.apply_deferred(&self.store);
                    tracing::debug!(?rotation, "applied deferred auth token");
                    Ok(())
                },
                HandshakeAction::NotifySubscribers => {
                    let notified = self.handshake.notify_subscribers();
                    tracing::debug!(notified, "notified load subscribers");
                    Ok(())
                },
                HandshakeAction::StopListening => self.stop_listening(),
            };

            if let Err(err) = result {
                tracing::warn!(error = %err, "host action failed");
                first_error.get_or_insert(err);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    fn stop_listening(&mut self) -> Result<(), SessionError> {
        if !self.listening {
            return Ok(());
        }
        self.listening = false;
        self.host.stop_listening().map_err(|e| SessionError::host(&e))
    }
}

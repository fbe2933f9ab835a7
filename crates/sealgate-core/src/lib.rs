//! Sealgate Core
//!
//! Sans-IO core for the embedded-context session channel: a one-shot
//! handshake that turns an out-of-band session token into a keyring, the
//! token store that holds the resulting secrets, and the two interceptors
//! that sign outgoing requests and decrypt incoming responses for a
//! declarative UI-update engine.
//!
//! # Architecture
//!
//! Nothing in this crate performs I/O or owns a clock. State machines take
//! the current instant as input and return actions for the caller to
//! execute, the same way a driver executes connection actions:
//!
//! ```text
//!  InboundMessage ──> Handshake ──(ReadinessGate)──> TokenStore
//!                        │                              │
//!                        └─> HandshakeAction            ├─> RequestInterceptor  ──> ConfigRequest
//!                            (Acknowledge, Loaded,      └─> ResponseInterceptor ──> BeforeSwap / UiEngine
//!                             StopListening)
//! ```
//!
//! The cryptography itself lives behind [`CryptoFacade`] and [`Keyring`].
//! The core never encrypts anything on its own.
//!
//! # Concurrency
//!
//! Everything here runs on a single cooperative event loop. The
//! [`TokenStore`] uses `OnceCell`/`RefCell` and is deliberately `!Sync`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod engine;
pub mod env;
pub mod error;
pub mod facade;
pub mod gate;
pub mod handshake;
pub mod headers;
pub mod message;
pub mod request;
pub mod response;
pub mod store;

pub use config::{GateConfig, HeaderNames, SessionConfig};
pub use engine::{BeforeSwap, ConfigRequest, ResponseHead, UiEngine};
pub use env::Environment;
pub use error::{CryptoError, GateError, RequestError, StoreError};
pub use facade::{CryptoFacade, Keyring};
pub use gate::{GateStatus, ReadinessGate, await_primitive};
pub use handshake::{Handshake, HandshakeAction, HandshakeState};
pub use headers::Headers;
pub use message::{ACK_MESSAGE, InboundMessage, SessionMessage};
pub use request::{RequestInterceptor, SignedRequest};
pub use response::{AuthRotation, ResponseInterceptor, ResponseOutcome, SwapOutcome};
pub use store::TokenStore;

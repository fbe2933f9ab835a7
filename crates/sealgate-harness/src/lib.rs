//! Deterministic simulation harness for the Sealgate session runtime.
//!
//! Simulated implementations of the Environment and Host traits plus an
//! in-memory DOM, so whole sessions run reproducibly from a seed.
//!
//! # Model-Based Testing
//!
//! [`SimWorld`] applies [`Operation`]s (deliveries, frames, time, requests,
//! responses) to a real [`sealgate_client::Session`] wired to fakes.
//! Operations derive `Arbitrary`, so the same world is driven by proptest
//! and by the fuzzer.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks WHAT must be true after every operation,
//! not specific scenarios. Use [`InvariantRegistry::standard()`] for the
//! handshake and interceptor invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fake;
pub mod invariants;
pub mod operation;
pub mod sim_dom;
pub mod sim_env;
pub mod sim_host;
pub mod world;

pub use fake::{FakeFacade, FakeKeyring};
pub use invariants::{
    ExactlyOnceHandshake, Invariant, InvariantRegistry, InvariantResult, NoPlaintextParameters,
    SessionSnapshot, StateMonotonicity, StoreMatchesState, SubscribersFireOnce, SwapReplacesChildren,
    TerminalStopsListening, Violation,
};
pub use operation::{OriginChoice, Operation, PayloadChoice};
pub use sim_dom::{NodeId, SimDom};
pub use sim_env::SimEnv;
pub use sim_host::{Ack, SimHost, SimHostError, SourceId};
pub use world::{PARENT_ORIGIN, SESSION_TOKEN, SimWorld};

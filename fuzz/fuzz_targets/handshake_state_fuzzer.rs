//! Fuzz target for the session handshake state machine
//!
//! Drive a simulated session with arbitrary operation sequences
//!
//! # Strategy
//!
//! - Deliveries: right, near-miss and foreign origins with every payload shape
//! - Timing: primitives load before, during or never relative to the message
//! - Gate: optional timeout so stranded sessions are reachable
//! - Interceptors: requests and responses interleaved with the handshake
//! - Host: posts may start failing at any point
//!
//! # Invariants
//!
//! - At most one acknowledgment and one keyring derivation
//! - Store holds secrets iff the handshake loaded
//! - Listener removed exactly once, on reaching a final state
//! - Subscribers fire once on success and never on failure

#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sealgate_harness::{InvariantRegistry, Operation, SimWorld};

#[derive(Debug, Arbitrary)]
struct Input {
    seed: u64,
    gate_timeout_ms: Option<u16>,
    ops: Vec<Operation>,
}

fuzz_target!(|input: Input| {
    let mut world = match input.gate_timeout_ms {
        Some(ms) => SimWorld::with_gate_timeout(input.seed, Duration::from_millis(u64::from(ms))),
        None => SimWorld::new(input.seed),
    };
    let registry = InvariantRegistry::standard();

    for (step, op) in input.ops.into_iter().enumerate() {
        if let Err(err) = world.apply(op) {
            assert!(world.session().host().is_refusing(), "unexpected error at step {step}: {err}");
        }
        registry.assert_all(&world.snapshot(), &format!("after step {step} ({op:?})"));
    }
});

//! Readiness gate.
//!
//! The crypto primitives may finish loading after the session message has
//! already arrived. The gate decouples "message received" from "message
//! processable": it re-checks a readiness predicate once per scheduler turn
//! and reports readiness exactly once.
//!
//! Two drivers share the same gate:
//!
//! - [`crate::Handshake::tick`] polls it once per animation frame (sans-IO)
//! - [`await_primitive`] polls it from an async task using
//!   [`Environment::sleep`]
//!
//! Neither blocks the event loop nor busy-waits.

use std::{ops::Sub, time::Duration};

use crate::{config::GateConfig, env::Environment, error::GateError};

/// Result of a single gate poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    /// Not ready yet, poll again next frame
    Pending,
    /// Ready. Returned exactly once.
    Ready,
    /// Timeout exceeded. Returned exactly once, only with a configured
    /// timeout.
    TimedOut {
        /// Time since the gate opened
        elapsed: Duration,
        /// Number of readiness checks performed
        polls: u64,
    },
    /// The gate already resolved; the predicate is no longer evaluated
    Spent,
}

/// Poll-driven readiness gate.
///
/// Generic over `Instant` so the same gate runs on real and virtual time.
#[derive(Debug, Clone)]
pub struct ReadinessGate<I> {
    started_at: I,
    timeout: Option<Duration>,
    polls: u64,
    resolved: bool,
}

impl<I> ReadinessGate<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Open a gate at `now`. `timeout` of `None` waits forever.
    pub fn new(now: I, timeout: Option<Duration>) -> Self {
        Self { started_at: now, timeout, polls: 0, resolved: false }
    }

    /// Number of times the predicate has been evaluated.
    pub fn polls(&self) -> u64 {
        self.polls
    }

    /// Whether the gate has reported `Ready` or `TimedOut`.
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Evaluate `check` once.
    ///
    /// The predicate is checked before the timeout, so a primitive that
    /// becomes ready on the last permitted frame still counts.
    pub fn poll(&mut self, now: I, check: impl FnOnce() -> bool) -> GateStatus {
        if self.resolved {
            return GateStatus::Spent;
        }

        self.polls += 1;
        if check() {
            self.resolved = true;
            return GateStatus::Ready;
        }

        let elapsed = now - self.started_at;
        match self.timeout {
            Some(timeout) if elapsed > timeout => {
                self.resolved = true;
                GateStatus::TimedOut { elapsed, polls: self.polls }
            },
            _ => GateStatus::Pending,
        }
    }
}

/// Wait until `check` returns true, then invoke `on_ready` exactly once.
///
/// Polls once per `config.frame_interval`. With no configured timeout this
/// future only completes once the primitive is ready.
///
/// # Errors
///
/// - `GateError::TimedOut` if `config.timeout` elapses first. `on_ready` is
///   not called in that case.
pub async fn await_primitive<E, C, R>(
    env: &E,
    config: &GateConfig,
    mut check: C,
    on_ready: R,
) -> Result<(), GateError>
where
    E: Environment,
    C: FnMut() -> bool,
    R: FnOnce(),
{
    let mut gate = ReadinessGate::new(env.now(), config.timeout);

    loop {
        match gate.poll(env.now(), &mut check) {
            GateStatus::Ready => {
                tracing::trace!(polls = gate.polls(), "primitive ready");
                on_ready();
                return Ok(());
            },
            GateStatus::Pending => env.sleep(config.frame_interval).await,
            GateStatus::TimedOut { elapsed, polls } => {
                return Err(GateError::TimedOut { elapsed, polls });
            },
            GateStatus::Spent => unreachable!("gate is local to this loop and polled until resolved"),
        }
    }
}

//! Invariant checking for deterministic simulation testing.
//!
//! Invariants are properties that must hold after every operation applied to
//! a [`crate::SimWorld`], whatever order messages, frames and loads arrive in.
//!
//! # Architecture
//!
//! The world extracts its observable state into a [`SessionSnapshot`], then
//! registered [`Invariant`] checks run against it. Violations carry the
//! invariant name and enough context to reproduce the failing step.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! world.apply(op)?;
//! registry.check_all(&world.snapshot())?;
//! ```

mod checks;
mod snapshot;

pub use checks::{
    ExactlyOnceHandshake, NoPlaintextParameters, StateMonotonicity, StoreMatchesState,
    SubscribersFireOnce, SwapReplacesChildren, TerminalStopsListening,
};
pub use snapshot::SessionSnapshot;

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// An invariant that can be checked against session state.
///
/// Invariants are behavioral properties that must always hold.
/// They capture WHAT must be true, not specific test scenarios.
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant against the current state.
    ///
    /// Returns `Ok(())` if the invariant holds, or a [`Violation`]
    /// describing what went wrong.
    fn check(&self, state: &SessionSnapshot) -> InvariantResult;

    /// Shorthand for building a violation of this invariant.
    fn violation(&self, message: String) -> Violation {
        Violation { invariant: self.name(), message }
    }
}

/// Registry of invariants to check.
///
/// Use [`InvariantRegistry::standard()`] for the full handshake and
/// interceptor set.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Create a registry with every standard invariant.
    ///
    /// Includes:
    /// - [`ExactlyOnceHandshake`]: at most one ack and one keyring
    /// - [`StoreMatchesState`]: secrets present iff loaded
    /// - [`TerminalStopsListening`]: listener removed exactly once at the end
    /// - [`StateMonotonicity`]: the handshake never moves backwards
    /// - [`SubscribersFireOnce`]: completion callbacks fire once, on load
    /// - [`NoPlaintextParameters`]: signed requests never carry plaintext
    /// - [`SwapReplacesChildren`]: swaps replace rather than append
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(ExactlyOnceHandshake);
        registry.add(StoreMatchesState);
        registry.add(TerminalStopsListening);
        registry.add(StateMonotonicity);
        registry.add(SubscribersFireOnce);
        registry.add(NoPlaintextParameters);
        registry.add(SwapReplacesChildren);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants against the given state.
    ///
    /// # Errors
    ///
    /// Every violation found, in registration order.
    pub fn check_all(&self, state: &SessionSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Check all invariants, panicking with every violation.
    ///
    /// Use this in tests where you want immediate failure with context.
    ///
    /// # Panics
    ///
    /// If any invariant is violated.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &SessionSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("Invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}

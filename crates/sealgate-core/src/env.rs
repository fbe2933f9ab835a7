//! Environment abstraction for deterministic testing.
//!
//! Decouples handshake and gate logic from system resources (time,
//! randomness). Production hosts use the real clock and OS entropy; the
//! simulation harness uses a virtual clock and a seeded RNG.

use std::time::Duration;

/// Abstract environment providing time, randomness, and async primitives.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - Methods are infallible except in exceptional circumstances (e.g., OS
///   entropy exhaustion, incorrect simulation setup)
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`, while simulation
    /// environments use virtual time.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    ///
    /// # Invariants
    ///
    /// - Subsequent calls must return times >= previous calls.
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code (the readiness poll loop) awaits this. State
    /// machines never do.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same RNG seed, this produces the same sequence of bytes
    /// - Uses cryptographically secure RNG in production
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Seconds since the Unix epoch.
    ///
    /// Used for session-token expiry, which is expressed in wall-clock time
    /// by the issuing parent.
    fn wall_clock_secs(&self) -> u64;
}

//! Deterministic environment for unit tests.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use sealgate_core::Environment;

/// Wall clock fixed at `wall_clock`; random bytes from a shared counter.
#[derive(Clone, Default)]
pub(crate) struct CountingEnv {
    counter: Arc<AtomicU64>,
    pub(crate) wall_clock: u64,
}

impl CountingEnv {
    pub(crate) fn at(wall_clock: u64) -> Self {
        Self { wall_clock, ..Self::default() }
    }
}

impl Environment for CountingEnv {
    type Instant = Duration;

    fn now(&self) -> Duration {
        Duration::from_secs(self.wall_clock)
    }

    fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        std::future::ready(())
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        for chunk in buffer.chunks_mut(8) {
            let next = self.counter.fetch_add(1, Ordering::Relaxed).to_le_bytes();
            chunk.copy_from_slice(&next[..chunk.len()]);
        }
    }

    fn wall_clock_secs(&self) -> u64 {
        self.wall_clock
    }
}

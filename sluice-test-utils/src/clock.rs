//! Simulated wall clock pinned to the tokio test clock.

use sluice_core::{Clock, Mts};
use tokio::time::Instant;

/// Clock that starts at an arbitrary epoch base and advances with tokio
/// time, so `start_paused` tests control it through `tokio::time::advance`
/// and auto-advance.
#[derive(Clone, Copy, Debug)]
pub struct SimClock {
    base_ms: Mts,
    origin: Instant,
}

impl SimClock {
    /// Must be constructed inside a tokio runtime.
    #[must_use]
    pub fn starting_at(base_ms: Mts) -> Self {
        Self {
            base_ms,
            origin: Instant::now(),
        }
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> Mts {
        self.base_ms + self.origin.elapsed().as_millis() as Mts
    }
}

//! Typed observer events.
//!
//! Events are published from the same task that mutates strategy state, so
//! the order observers see `rt_execution_results` in always matches the
//! order of state updates.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::trace;

use crate::error::ExecError;
use crate::results::{PositionReport, ResultsSnapshot};

const DEFAULT_CAPACITY: usize = 2048;

/// Everything the engine reports outward.
#[derive(Clone, Debug)]
pub enum ExecutionEvent {
    /// A steady-state failure the host may want to react to.
    Error(Arc<ExecError>),
    /// The open position together with its current PnL figures.
    OpenedPositionData(PositionReport),
    /// Full results snapshot after a processed candle, trade, or perf tick.
    ExecutionResults(Arc<ResultsSnapshot>),
}

/// Fan-out channel for [`ExecutionEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Attach a new observer.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.tx.subscribe()
    }

    /// Publish to all observers. Having no observers is not an error.
    pub(crate) fn publish(&self, event: ExecutionEvent) {
        if self.tx.send(event).is_err() {
            trace!("no observers attached; event dropped");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

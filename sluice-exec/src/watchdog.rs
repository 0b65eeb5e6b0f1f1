//! Wall-clock fallback that closes out a bar when the exchange goes quiet.
//!
//! Exchanges stop emitting candles for illiquid bars, but the strategy must
//! still see every close. After each observed candle a one-shot timer is
//! armed for `last.mts + 1.5 * width` wall-clock; if no successor arrived by
//! then, a flat zero-volume candle for the next bucket is fed through the
//! normal candle path, which closes the stalled bar.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use sluice_core::Clock;

use crate::queue::{MessageKind, QueueMessage, SharedState};

/// Grace period before a bar is considered abandoned: one and a half widths.
pub(crate) const fn closure_grace(width_ms: i64) -> i64 {
    width_ms + width_ms / 2
}

/// (Re-)arm the closure timer off the current `last_candle`.
///
/// No-op while paused or stopped, and with no candle observed yet. Any
/// previously armed timer is aborted.
pub(crate) fn arm<St: Send + 'static>(
    shared: &Arc<SharedState<St>>,
    clock: &Arc<dyn Clock>,
    width_ms: i64,
) {
    if shared.is_stopped() || shared.is_paused() {
        return;
    }
    let Some(last) = shared.last_candle() else {
        return;
    };
    let grace = closure_grace(width_ms);
    let delay = (last.mts + grace - clock.now_ms()).max(0);

    let task_shared = Arc::clone(shared);
    let clock = Arc::clone(clock);
    let handle = tokio::spawn(async move {
        sleep(Duration::from_millis(delay as u64)).await;
        if task_shared.is_stopped() || task_shared.is_paused() {
            return;
        }
        // Re-read: a later candle may have raced the timer hand-over.
        let Some(last) = task_shared.last_candle() else {
            return;
        };
        if clock.now_ms() - last.mts < grace {
            return;
        }
        let synthetic = last.next_synthetic();
        debug!(
            mts = synthetic.mts,
            "no candle before closure deadline; synthesizing"
        );
        let sort_mts = synthetic.mts;
        task_shared.enqueue(QueueMessage {
            kind: MessageKind::Candle(synthetic),
            sort_mts,
        });
    });
    shared.set_watchdog(handle);
}

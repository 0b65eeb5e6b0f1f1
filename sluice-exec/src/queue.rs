//! Shared message queue and execution flags.
//!
//! Intake callbacks, the watchdog and the pause/resume controller only ever
//! append here; the serial processor is the single consumer and the only
//! component that touches strategy state. Everything shared across those
//! tasks lives in this one structure, each field guarded as noted.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;

use sluice_core::{Candle, Mts, Trade, Wallet};

/// Strategy-state transformation funneled through the serial processor.
pub(crate) type StateHandler<St> = Box<dyn FnOnce(St) -> St + Send>;

/// Payload of one queued message.
pub(crate) enum MessageKind<St> {
    Candle(Candle),
    Trade(Trade),
    OrderClosed(Value),
    WalletSnapshot(Vec<Wallet>),
    WalletUpdate(Wallet),
    PerfTick,
    Invoke(StateHandler<St>),
}

impl<St> MessageKind<St> {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::Candle(_) => "candle",
            Self::Trade(_) => "trade",
            Self::OrderClosed(_) => "order-close",
            Self::WalletSnapshot(_) => "wallet-snapshot",
            Self::WalletUpdate(_) => "wallet-update",
            Self::PerfTick => "perf-tick",
            Self::Invoke(_) => "invoke",
        }
    }
}

/// One queued message with its resume-sort key.
pub(crate) struct QueueMessage<St> {
    pub kind: MessageKind<St>,
    /// Payload `mts` for candles and trades, receive time otherwise. The
    /// resume-time sort is stable, so equal keys keep insertion order.
    pub sort_mts: Mts,
}

/// Wall-clock marks of the current pause window.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PauseMarks {
    pub paused_on: Mts,
    pub resumed_on: Option<Mts>,
}

/// State shared between intake, processor, watchdog and the lifecycle API.
pub(crate) struct SharedState<St> {
    queue: Mutex<VecDeque<QueueMessage<St>>>,
    wakeup: Notify,
    paused: AtomicBool,
    stopped: AtomicBool,
    processing: AtomicBool,
    /// Monotonic watermark for price feed pushes, advanced from both the
    /// intake task (trade prices) and the processor (candle prices).
    price_watermark: AtomicI64,
    pause_marks: Mutex<Option<PauseMarks>>,
    /// Written by the processor; read by the watchdog and resume back-fill.
    last_candle: Mutex<Option<Candle>>,
    watchdog: Mutex<Option<JoinHandle<()>>>,
}

impl<St> SharedState<St> {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            wakeup: Notify::new(),
            paused: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            processing: AtomicBool::new(false),
            price_watermark: AtomicI64::new(i64::MIN),
            pause_marks: Mutex::new(None),
            last_candle: Mutex::new(None),
            watchdog: Mutex::new(None),
        }
    }

    /// Append a message. Enqueues after stop are silently discarded.
    pub fn enqueue(&self, message: QueueMessage<St>) {
        if self.is_stopped() {
            debug!(kind = message.kind.label(), "discarding enqueue after stop");
            return;
        }
        self.queue
            .lock()
            .expect("queue lock poisoned")
            .push_back(message);
        self.wakeup.notify_one();
    }

    /// Pop the next message unless draining is suspended.
    pub fn pop_runnable(&self) -> Option<QueueMessage<St>> {
        if self.is_paused() {
            return None;
        }
        self.queue.lock().expect("queue lock poisoned").pop_front()
    }

    /// Park until new work (or a control transition) is signalled.
    pub async fn wait_for_work(&self) {
        self.wakeup.notified().await;
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn set_processing(&self, value: bool) {
        self.processing.store(value, Ordering::SeqCst);
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Freeze draining. Returns `false` when already paused.
    pub fn pause(&self, now: Mts) -> bool {
        if self.paused.swap(true, Ordering::SeqCst) {
            return false;
        }
        *self.pause_marks.lock().expect("pause marks lock poisoned") = Some(PauseMarks {
            paused_on: now,
            resumed_on: None,
        });
        self.cancel_watchdog();
        true
    }

    /// Record the resume timestamp. Returns the matching pause timestamp,
    /// or `None` when the engine was not paused.
    pub fn begin_resume(&self, now: Mts) -> Option<Mts> {
        if !self.is_paused() {
            return None;
        }
        let mut marks = self.pause_marks.lock().expect("pause marks lock poisoned");
        let current = marks.as_mut()?;
        current.resumed_on = Some(now);
        Some(current.paused_on)
    }

    /// Prepend back-fill messages, restore global `mts` order across any
    /// messages buffered during the pause, and unfreeze draining.
    pub fn resume_with_backfill(&self, backfill: Vec<QueueMessage<St>>) {
        {
            let mut queue = self.queue.lock().expect("queue lock poisoned");
            for message in backfill.into_iter().rev() {
                queue.push_front(message);
            }
            queue.make_contiguous().sort_by_key(|message| message.sort_mts);
        }
        *self.pause_marks.lock().expect("pause marks lock poisoned") = None;
        self.paused.store(false, Ordering::SeqCst);
        self.wakeup.notify_one();
    }

    /// Latch the terminal state and wake the processor so it can wind down.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.cancel_watchdog();
        self.wakeup.notify_one();
    }

    /// Advance the price watermark; returns the previous value.
    pub fn advance_price_watermark(&self, mts: Mts) -> Mts {
        self.price_watermark.fetch_max(mts, Ordering::SeqCst)
    }

    pub fn last_candle(&self) -> Option<Candle> {
        self.last_candle
            .lock()
            .expect("last candle lock poisoned")
            .clone()
    }

    pub fn set_last_candle(&self, candle: Candle) {
        *self.last_candle.lock().expect("last candle lock poisoned") = Some(candle);
    }

    /// Replace the armed watchdog, aborting the previous one.
    pub fn set_watchdog(&self, handle: JoinHandle<()>) {
        let mut slot = self.watchdog.lock().expect("watchdog lock poisoned");
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    pub fn cancel_watchdog(&self) {
        if let Some(handle) = self
            .watchdog
            .lock()
            .expect("watchdog lock poisoned")
            .take()
        {
            handle.abort();
        }
    }
}

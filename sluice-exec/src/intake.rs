//! Live feed intake and the pause/resume controller.
//!
//! The intake task is the only reader of the feed connection. It normalizes
//! events into queue messages, pushes trade prices to the price feed, and
//! reacts to socket transitions: a drop freezes draining, a restore
//! back-fills the missed candles through the throttled fetcher before
//! draining resumes.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use sluice_core::{Candle, Clock, Symbol, Timeframe};

use crate::error::ExecError;
use crate::events::{EventBus, ExecutionEvent};
use crate::feed::{CandleQuery, FeedConnection, FeedEvent};
use crate::padding::pad_candles;
use crate::price::PriceFeed;
use crate::queue::{MessageKind, QueueMessage, SharedState};
use crate::throttle::ThrottledHistory;
use crate::watchdog;

/// Look-back applied before the pause mark when back-filling, covering clock
/// skew and the bucket that was open when the socket dropped.
pub(crate) const RESUME_LOOKBEHIND_MS: i64 = 120_000;

pub(crate) struct Intake<St> {
    pub feed: Box<dyn FeedConnection>,
    pub shared: Arc<SharedState<St>>,
    pub history: Arc<ThrottledHistory>,
    pub bus: EventBus,
    pub price_feed: Arc<dyn PriceFeed>,
    pub clock: Arc<dyn Clock>,
    pub symbol: Symbol,
    pub tf: Timeframe,
    pub include_trades: bool,
}

impl<St: Send + 'static> Intake<St> {
    pub async fn run(mut self) {
        loop {
            if self.shared.is_stopped() {
                break;
            }
            match self.feed.next_event().await {
                Ok(Some(event)) => self.handle(event).await,
                Ok(None) => {
                    debug!("feed stream ended");
                    break;
                }
                Err(err) => {
                    error!(error = %err, "feed stream failed");
                    self.bus
                        .publish(ExecutionEvent::Error(Arc::new(ExecError::Feed(err))));
                    break;
                }
            }
        }
    }

    async fn handle(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Candle(candle) => self.enqueue_candle(candle),
            FeedEvent::CandleSnapshot(mut candles) => {
                if candles.len() == 1 {
                    // A one-element snapshot is the open bar re-sent.
                    self.enqueue_candle(candles.remove(0));
                } else {
                    // Seeding owns history; snapshots delivered on
                    // subscription would replay bars the strategy has
                    // already seen.
                    debug!(candles = candles.len(), "dropping candle snapshot");
                }
            }
            FeedEvent::Trade(trade) => {
                if self.shared.advance_price_watermark(trade.mts) < trade.mts {
                    self.price_feed.update(trade.price, trade.mts);
                }
                if self.include_trades {
                    let sort_mts = trade.mts;
                    self.shared.enqueue(QueueMessage {
                        kind: MessageKind::Trade(trade),
                        sort_mts,
                    });
                }
            }
            FeedEvent::TradeSnapshot(trades) => {
                debug!(trades = trades.len(), "dropping trade snapshot");
            }
            FeedEvent::OrderClosed(order) => {
                self.shared.enqueue(QueueMessage {
                    kind: MessageKind::OrderClosed(order),
                    sort_mts: self.clock.now_ms(),
                });
            }
            FeedEvent::WalletSnapshot(wallets) => {
                self.shared.enqueue(QueueMessage {
                    kind: MessageKind::WalletSnapshot(wallets),
                    sort_mts: self.clock.now_ms(),
                });
            }
            FeedEvent::WalletUpdate(wallet) => {
                self.shared.enqueue(QueueMessage {
                    kind: MessageKind::WalletUpdate(wallet),
                    sort_mts: self.clock.now_ms(),
                });
            }
            FeedEvent::SocketClosed => {
                if self.shared.pause(self.clock.now_ms()) {
                    info!(symbol = %self.symbol, "socket lost; execution paused");
                }
            }
            FeedEvent::SocketOpened => self.resume().await,
            FeedEvent::Raw { channel, payload } => {
                warn!(channel = %channel, ?payload, "dropping unrecognized feed message");
            }
        }
    }

    fn enqueue_candle(&self, mut candle: Candle) {
        candle.symbol = self.symbol.clone();
        candle.tf = self.tf;
        let sort_mts = candle.mts;
        self.shared.enqueue(QueueMessage {
            kind: MessageKind::Candle(candle),
            sort_mts,
        });
    }

    /// Back-fill the candles missed during the pause, splice them in ahead
    /// of anything buffered while frozen, and unfreeze draining.
    async fn resume(&mut self) {
        let resumed_on = self.clock.now_ms();
        let Some(paused_on) = self.shared.begin_resume(resumed_on) else {
            debug!("socket opened while live; nothing to resume");
            return;
        };

        let start = paused_on - RESUME_LOOKBEHIND_MS;
        let query = CandleQuery::new(self.symbol.clone(), self.tf).with_range(start, resumed_on);
        let backfill = match self.history.candles(&query).await {
            Ok(candles) => {
                let width = self.tf.width_ms();
                let pad_start = self.tf.align_down(start);
                let pad_end = self.tf.align_down(resumed_on) + width;
                pad_candles(candles, self.tf, pad_start, pad_end)
            }
            Err(err) => {
                // Resuming stale beats stalling indefinitely.
                warn!(error = %err, "back-fill fetch failed; resuming without it");
                Vec::new()
            }
        };

        info!(
            candles = backfill.len(),
            paused_on, resumed_on, "resuming execution"
        );
        let messages = backfill
            .into_iter()
            .map(|mut candle| {
                candle.symbol = self.symbol.clone();
                candle.tf = self.tf;
                let sort_mts = candle.mts;
                QueueMessage {
                    kind: MessageKind::Candle(candle),
                    sort_mts,
                }
            })
            .collect();
        self.shared.resume_with_backfill(messages);
        watchdog::arm(&self.shared, &self.clock, self.tf.width_ms());
    }
}

//! Scripted feed connection driven from test code.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use sluice_core::{Candle, Timeframe, Trade, Wallet};
use sluice_exec::{FeedConnection, FeedEvent, FeedResult};

/// Feed implementation that replays exactly the events a test pushes
/// through its [`FeedHandle`].
pub struct ScriptedFeed {
    events: mpsc::UnboundedReceiver<FeedEvent>,
    subscriptions: Arc<Mutex<Vec<String>>>,
}

impl ScriptedFeed {
    #[must_use]
    pub fn new() -> (Self, FeedHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscriptions = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                events: rx,
                subscriptions: subscriptions.clone(),
            },
            FeedHandle { tx, subscriptions },
        )
    }
}

#[async_trait]
impl FeedConnection for ScriptedFeed {
    async fn subscribe_candles(&mut self, symbol: &str, tf: Timeframe) -> FeedResult<()> {
        self.subscriptions
            .lock()
            .unwrap()
            .push(format!("candles:trade:{}:{symbol}", tf.label()));
        Ok(())
    }

    async fn subscribe_trades(&mut self, symbol: &str) -> FeedResult<()> {
        self.subscriptions
            .lock()
            .unwrap()
            .push(format!("trades:{symbol}"));
        Ok(())
    }

    async fn next_event(&mut self) -> FeedResult<Option<FeedEvent>> {
        Ok(self.events.recv().await)
    }
}

/// Test-side controller for a [`ScriptedFeed`].
///
/// Sends are infallible from the test's point of view; once the engine is
/// stopped the events simply go nowhere. Dropping the handle ends the feed
/// stream.
#[derive(Clone)]
pub struct FeedHandle {
    tx: mpsc::UnboundedSender<FeedEvent>,
    subscriptions: Arc<Mutex<Vec<String>>>,
}

impl FeedHandle {
    pub fn send(&self, event: FeedEvent) {
        let _ = self.tx.send(event);
    }

    pub fn candle(&self, candle: Candle) {
        self.send(FeedEvent::Candle(candle));
    }

    pub fn candle_snapshot(&self, candles: Vec<Candle>) {
        self.send(FeedEvent::CandleSnapshot(candles));
    }

    pub fn trade(&self, trade: Trade) {
        self.send(FeedEvent::Trade(trade));
    }

    pub fn trade_snapshot(&self, trades: Vec<Trade>) {
        self.send(FeedEvent::TradeSnapshot(trades));
    }

    pub fn order_closed(&self, order: Value) {
        self.send(FeedEvent::OrderClosed(order));
    }

    pub fn wallet_snapshot(&self, wallets: Vec<Wallet>) {
        self.send(FeedEvent::WalletSnapshot(wallets));
    }

    pub fn wallet_update(&self, wallet: Wallet) {
        self.send(FeedEvent::WalletUpdate(wallet));
    }

    pub fn open_socket(&self) {
        self.send(FeedEvent::SocketOpened);
    }

    pub fn close_socket(&self) {
        self.send(FeedEvent::SocketClosed);
    }

    pub fn raw(&self, channel: &str, payload: Value) {
        self.send(FeedEvent::Raw {
            channel: channel.to_string(),
            payload,
        });
    }

    /// Channels subscribed so far, in subscription order.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().unwrap().clone()
    }
}

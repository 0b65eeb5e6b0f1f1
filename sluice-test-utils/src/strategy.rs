//! Recording strategy: journals every callback so tests can assert on
//! delivery order, and threads a value-semantics state so tests can assert
//! on state evolution separately.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::Notify;

use sluice_core::{Candle, Mts, Position, Price, Trade};
use sluice_strategy::{Strategy, StrategyError, StrategyResult};

/// Opaque state threaded through the recording strategy's callbacks.
///
/// Only successful callbacks append here, so the state shows exactly which
/// transitions the engine adopted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordingState {
    pub seed_mts: Vec<Mts>,
    pub candle_mts: Vec<Mts>,
    pub trade_ids: Vec<i64>,
    pub orders: usize,
    pub invokes: usize,
    pub ended: bool,
    pub flattened: bool,
}

/// Shared record of every callback invocation, successful or not.
#[derive(Default)]
pub struct Journal {
    seed_candles: Mutex<Vec<Candle>>,
    candles: Mutex<Vec<Candle>>,
    trades: Mutex<Vec<Trade>>,
    orders: Mutex<Vec<Value>>,
    on_end_calls: AtomicUsize,
    close_calls: AtomicUsize,
    notify: Notify,
}

impl Journal {
    fn record_seed(&self, candle: &Candle) {
        self.seed_candles.lock().unwrap().push(candle.clone());
        self.notify.notify_waiters();
    }

    fn record_candle(&self, candle: &Candle) {
        self.candles.lock().unwrap().push(candle.clone());
        self.notify.notify_waiters();
    }

    fn record_trade(&self, trade: &Trade) {
        self.trades.lock().unwrap().push(trade.clone());
        self.notify.notify_waiters();
    }

    fn record_order(&self, order: &Value) {
        self.orders.lock().unwrap().push(order.clone());
        self.notify.notify_waiters();
    }

    #[must_use]
    pub fn seed_mts(&self) -> Vec<Mts> {
        self.seed_candles.lock().unwrap().iter().map(|c| c.mts).collect()
    }

    #[must_use]
    pub fn candle_mts(&self) -> Vec<Mts> {
        self.candles.lock().unwrap().iter().map(|c| c.mts).collect()
    }

    #[must_use]
    pub fn candles(&self) -> Vec<Candle> {
        self.candles.lock().unwrap().clone()
    }

    #[must_use]
    pub fn trade_ids(&self) -> Vec<i64> {
        self.trades.lock().unwrap().iter().map(|t| t.id).collect()
    }

    #[must_use]
    pub fn orders(&self) -> Vec<Value> {
        self.orders.lock().unwrap().clone()
    }

    #[must_use]
    pub fn on_end_calls(&self) -> usize {
        self.on_end_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Park until at least `count` live candles were delivered.
    pub async fn wait_for_candles(&self, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.candles.lock().unwrap().len() >= count {
                return;
            }
            notified.await;
        }
    }

    /// Park until at least `count` trades were delivered.
    pub async fn wait_for_trades(&self, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.trades.lock().unwrap().len() >= count {
                return;
            }
            notified.await;
        }
    }

    /// Park until at least `count` order-close payloads were delivered.
    pub async fn wait_for_orders(&self, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.orders.lock().unwrap().len() >= count {
                return;
            }
            notified.await;
        }
    }
}

/// Strategy whose behavior is entirely scripted by the test.
pub struct RecordingStrategy {
    symbol: String,
    journal: Arc<Journal>,
    position: Arc<Mutex<Option<Position>>>,
    realized: Decimal,
    fail_candles: HashSet<Mts>,
}

impl RecordingStrategy {
    #[must_use]
    pub fn new(symbol: &str) -> (Self, Arc<Journal>) {
        let journal = Arc::new(Journal::default());
        (
            Self {
                symbol: symbol.to_string(),
                journal: journal.clone(),
                position: Arc::new(Mutex::new(None)),
                realized: Decimal::ZERO,
                fail_candles: HashSet::new(),
            },
            journal,
        )
    }

    /// Make `on_candle` fail for specific bar timestamps.
    #[must_use]
    pub fn failing_on_candles(mut self, mts: impl IntoIterator<Item = Mts>) -> Self {
        self.fail_candles.extend(mts);
        self
    }

    /// Shared slot tests use to plant or inspect the open position.
    #[must_use]
    pub fn position_slot(&self) -> Arc<Mutex<Option<Position>>> {
        self.position.clone()
    }

    #[must_use]
    pub fn with_realized_pnl(mut self, realized: Decimal) -> Self {
        self.realized = realized;
        self
    }
}

impl Strategy for RecordingStrategy {
    type State = RecordingState;

    fn on_seed_candle(
        &mut self,
        mut state: Self::State,
        candle: &Candle,
    ) -> StrategyResult<Self::State> {
        self.journal.record_seed(candle);
        state.seed_mts.push(candle.mts);
        Ok(state)
    }

    fn on_candle(&mut self, mut state: Self::State, candle: &Candle) -> StrategyResult<Self::State> {
        self.journal.record_candle(candle);
        if self.fail_candles.contains(&candle.mts) {
            return Err(StrategyError::Internal(format!(
                "scripted failure at {}",
                candle.mts
            )));
        }
        state.candle_mts.push(candle.mts);
        Ok(state)
    }

    fn on_trade(&mut self, mut state: Self::State, trade: &Trade) -> StrategyResult<Self::State> {
        self.journal.record_trade(trade);
        state.trade_ids.push(trade.id);
        Ok(state)
    }

    fn on_order(
        &mut self,
        mut state: Self::State,
        order: &Value,
    ) -> StrategyResult<Self::State> {
        self.journal.record_order(order);
        state.orders += 1;
        Ok(state)
    }

    fn on_end(&mut self, mut state: Self::State) -> StrategyResult<Self::State> {
        self.journal.on_end_calls.fetch_add(1, Ordering::SeqCst);
        self.journal.notify.notify_waiters();
        state.ended = true;
        Ok(state)
    }

    fn position(&self, _state: &Self::State, symbol: &str) -> Option<Position> {
        self.position
            .lock()
            .unwrap()
            .clone()
            .filter(|position| position.symbol == symbol)
    }

    fn close_open_positions(&mut self, mut state: Self::State) -> StrategyResult<Self::State> {
        self.journal.close_calls.fetch_add(1, Ordering::SeqCst);
        self.journal.notify.notify_waiters();
        *self.position.lock().unwrap() = None;
        state.flattened = true;
        Ok(state)
    }

    fn realized_pnl(&self, _state: &Self::State, _position: &Position) -> Price {
        self.realized
    }

    fn unrealized_pnl(&self, _state: &Self::State, position: &Position, price: Price) -> Price {
        (price - position.base_price) * position.amount
    }
}

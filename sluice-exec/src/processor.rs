//! Single-consumer drain loop invoking strategy callbacks in stream order.

use std::sync::Arc;

use tracing::{debug, error, info};

use sluice_core::{Candle, CandlePrice, Clock, Price, Symbol, Timeframe, Trade};
use sluice_strategy::{Strategy, StrategyResult};

use crate::config::ExecutionConfig;
use crate::error::ExecError;
use crate::events::{EventBus, ExecutionEvent};
use crate::perf::PerfTracker;
use crate::price::PriceFeed;
use crate::queue::{MessageKind, QueueMessage, SharedState};
use crate::results::{EquityStats, PerfReport, PositionReport, ResultsSnapshot};
use crate::wallet::WalletBook;
use crate::watchdog;

/// The sole owner of strategy state. Messages are dispatched strictly in
/// queue order; at most one callback runs at any time.
pub(crate) struct Processor<S: Strategy> {
    strategy: S,
    /// Always `Some` between dispatches; taken while a callback runs.
    state: Option<S::State>,
    shared: Arc<SharedState<S::State>>,
    bus: EventBus,
    price_feed: Arc<dyn PriceFeed>,
    perf: Arc<dyn PerfTracker>,
    clock: Arc<dyn Clock>,
    symbol: Symbol,
    tf: Timeframe,
    candle_price: CandlePrice,
    last_trade: Option<Trade>,
    wallets: WalletBook,
    closed_candles: Vec<Candle>,
    trades: Vec<Trade>,
}

impl<S: Strategy> Processor<S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        strategy: S,
        state: S::State,
        config: &ExecutionConfig,
        shared: Arc<SharedState<S::State>>,
        bus: EventBus,
        price_feed: Arc<dyn PriceFeed>,
        perf: Arc<dyn PerfTracker>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            strategy,
            state: Some(state),
            shared,
            bus,
            price_feed,
            perf,
            clock,
            symbol: config.symbol.clone(),
            tf: config.timeframe,
            candle_price: config.candle_price,
            last_trade: None,
            wallets: WalletBook::new(),
            closed_candles: Vec::new(),
            trades: Vec::new(),
        }
    }

    /// Drain until stopped, then run the teardown callbacks and hand back
    /// the final strategy state.
    pub async fn run(mut self) -> S::State {
        loop {
            if self.shared.is_stopped() {
                break;
            }
            match self.shared.pop_runnable() {
                Some(message) => {
                    self.shared.set_processing(true);
                    self.dispatch(message);
                }
                None => {
                    self.shared.set_processing(false);
                    self.shared.wait_for_work().await;
                }
            }
        }
        self.shared.set_processing(false);
        self.teardown();
        info!(symbol = %self.symbol, "execution stopped");
        self.state.take().expect("strategy state present")
    }

    fn dispatch(&mut self, message: QueueMessage<S::State>) {
        match message.kind {
            MessageKind::Candle(candle) => self.process_candle(candle),
            MessageKind::Trade(trade) => self.process_trade(trade),
            MessageKind::OrderClosed(order) => {
                self.with_state("on_order", |strategy, state| {
                    strategy.on_order(state, &order)
                });
            }
            MessageKind::WalletSnapshot(wallets) => self.wallets.apply_snapshot(wallets),
            MessageKind::WalletUpdate(wallet) => self.wallets.apply_update(&wallet),
            MessageKind::PerfTick => self.emit_results(None, self.clock.now_ms()),
            MessageKind::Invoke(handler) => {
                let state = self.state.take().expect("strategy state present");
                self.state = Some(handler(state));
            }
        }
    }

    /// An equal `mts` is an in-progress update of the open bar; a greater
    /// `mts` closes the previous bar; an older `mts` is dropped.
    fn process_candle(&mut self, candle: Candle) {
        let price = candle.price(self.candle_price);
        if self.shared.advance_price_watermark(candle.mts) < candle.mts {
            self.price_feed.update(price, candle.mts);
        }

        match self.shared.last_candle() {
            Some(previous) if previous.mts > candle.mts => {
                debug!(
                    mts = candle.mts,
                    last = previous.mts,
                    "dropping out-of-order candle"
                );
                return;
            }
            Some(previous) if previous.mts < candle.mts => {
                self.closed_candles.push(previous.clone());
                self.with_state("on_candle", |strategy, state| {
                    strategy.on_candle(state, &previous)
                });
                self.shared.set_last_candle(candle.clone());
            }
            // First candle, or an update of the currently open bar: track it
            // without closing anything.
            _ => self.shared.set_last_candle(candle.clone()),
        }

        self.emit_results(Some(price), candle.mts);
        watchdog::arm(&self.shared, &self.clock, self.tf.width_ms());
    }

    fn process_trade(&mut self, mut trade: Trade) {
        if let Some(last) = &self.last_trade {
            if trade.id <= last.id {
                debug!(id = trade.id, last = last.id, "dropping duplicate trade");
                return;
            }
        }
        trade.symbol = self.symbol.clone();
        self.with_state("on_trade", |strategy, state| strategy.on_trade(state, &trade));
        self.last_trade = Some(trade.clone());
        let price = trade.price;
        let mts = trade.mts;
        self.trades.push(trade);
        self.emit_results(Some(price), mts);
    }

    /// Run one callback with last-good-state semantics: on failure the
    /// previous state is kept and the error goes to observers.
    fn with_state<F>(&mut self, callback: &'static str, run: F)
    where
        F: FnOnce(&mut S, S::State) -> StrategyResult<S::State>,
    {
        let state = self.state.take().expect("strategy state present");
        let backup = state.clone();
        match run(&mut self.strategy, state) {
            Ok(next) => self.state = Some(next),
            Err(err) => {
                error!(error = %err, callback, "strategy callback failed; keeping previous state");
                self.state = Some(backup);
                self.bus
                    .publish(ExecutionEvent::Error(Arc::new(ExecError::Strategy(err))));
            }
        }
    }

    fn emit_results(&mut self, price: Option<Price>, mts: i64) {
        let price = price.or_else(|| self.price_feed.last().map(|point| point.price));
        let state = self.state.as_ref().expect("strategy state present");
        let open_position = self.strategy.position(state, &self.symbol);

        let report = match (price, open_position) {
            (Some(price), Some(position)) => Some(PositionReport {
                realized_pnl: self.strategy.realized_pnl(state, &position),
                unrealized_pnl: self.strategy.unrealized_pnl(state, &position, price),
                position,
            }),
            _ => None,
        };
        if let Some(report) = &report {
            self.bus
                .publish(ExecutionEvent::OpenedPositionData(report.clone()));
        }

        let perf = PerfReport::collect(self.perf.as_ref());
        let equity_stats = EquityStats::compute(&perf.equity_curve);
        let snapshot = ResultsSnapshot {
            symbol: self.symbol.clone(),
            tf: self.tf,
            generated_at: mts,
            price,
            candles: self.closed_candles.clone(),
            trades: self.trades.clone(),
            wallets: self.wallets.entries().to_vec(),
            open_position: report,
            perf,
            equity_stats,
        };
        self.bus
            .publish(ExecutionEvent::ExecutionResults(Arc::new(snapshot)));
    }

    fn teardown(&mut self) {
        self.with_state("on_end", |strategy, state| strategy.on_end(state));
        let has_open_position = {
            let state = self.state.as_ref().expect("strategy state present");
            self.strategy.position(state, &self.symbol).is_some()
        };
        if has_open_position {
            info!(symbol = %self.symbol, "open position at stop; requesting close");
            self.with_state("close_open_positions", |strategy, state| {
                strategy.close_open_positions(state)
            });
        }
    }
}

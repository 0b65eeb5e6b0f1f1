//! Live strategy execution engine.
//!
//! The engine delivers a correctly ordered, gap-free stream of candles,
//! trades, order fills and wallet updates to a stateful strategy, and
//! manages that stream across reconnects, pauses and shutdown: historical
//! seeding, live subscription, pause/resume with gap back-fill, candle
//! closure detection with a wall-clock fallback, monotonic-dedup serial
//! processing, and a throttled history fetch layer.

pub mod config;
pub mod error;
pub mod events;
pub mod feed;
pub mod padding;
pub mod perf;
pub mod price;
pub mod results;
pub mod throttle;
pub mod wallet;

mod intake;
mod processor;
mod queue;
mod seed;
mod watchdog;

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use sluice_core::{Clock, SystemClock};
use sluice_strategy::Strategy;

pub use config::{ExecutionConfig, DEFAULT_SEED_CANDLE_COUNT};
pub use error::{ExecError, ExecResult};
pub use events::{EventBus, ExecutionEvent};
pub use feed::{
    CandleHistory, CandleQuery, FeedConnection, FeedError, FeedEvent, FeedResult, HistorySection,
    SortOrder,
};
pub use governor::Quota;
pub use padding::pad_candles;
pub use perf::PerfTracker;
pub use price::{PriceFeed, PricePoint, SharedPriceFeed};
pub use results::{EquityStats, PerfReport, PositionReport, ResultsSnapshot};
pub use throttle::{default_quota, ThrottledHistory};
pub use wallet::WalletBook;

use intake::Intake;
use processor::Processor;
use queue::{MessageKind, QueueMessage, SharedState};

/// Injected collaborators the engine is constructed around.
pub struct ExecutionDeps {
    /// Live subscription primitive; owns socket lifecycle and auth.
    pub feed: Box<dyn FeedConnection>,
    /// Rate-limited candle history, shared by seeding and back-fill.
    pub history: ThrottledHistory,
    /// Scalar price sink fed with monotonic updates.
    pub price_feed: Arc<dyn PriceFeed>,
    /// Performance aggregate read on every result emission.
    pub perf: Arc<dyn PerfTracker>,
    /// Wall-clock source; defaults to the system clock.
    pub clock: Arc<dyn Clock>,
}

impl ExecutionDeps {
    pub fn new(
        feed: Box<dyn FeedConnection>,
        history: ThrottledHistory,
        price_feed: Arc<dyn PriceFeed>,
        perf: Arc<dyn PerfTracker>,
    ) -> Self {
        Self {
            feed,
            history,
            price_feed,
            perf,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the wall-clock source (simulated clocks in tests).
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// A running execution: lifecycle handle over the intake, processor, perf
/// and watchdog tasks.
///
/// Transitions `fresh → seeding → live → (paused ↔ live)* → stopped`; the
/// stopped state is terminal and latched.
pub struct StrategyExecution<S: Strategy> {
    config: ExecutionConfig,
    shared: Arc<SharedState<S::State>>,
    bus: EventBus,
    clock: Arc<dyn Clock>,
    intake_task: JoinHandle<()>,
    perf_task: JoinHandle<()>,
    processor_task: Option<JoinHandle<S::State>>,
    final_state: Option<S::State>,
}

impl<S: Strategy + 'static> StrategyExecution<S> {
    /// Seed the strategy, subscribe to the live channels, and start the
    /// background tasks. Returns once seeding and subscription are complete;
    /// live processing continues in the background.
    ///
    /// Configuration and seeding failures abort here and leave the engine
    /// unstarted.
    pub async fn execute(
        mut strategy: S,
        initial_state: S::State,
        config: ExecutionConfig,
        deps: ExecutionDeps,
    ) -> ExecResult<Self> {
        config.validate()?;
        let ExecutionDeps {
            mut feed,
            history,
            price_feed,
            perf,
            clock,
        } = deps;
        let history = Arc::new(history);
        let bus = EventBus::default();

        // Seeding runs to completion before any live subscription is opened.
        let (state, last_candle) =
            seed::run(&mut strategy, initial_state, &config, &history, clock.as_ref()).await?;

        let shared = Arc::new(SharedState::new());
        if let Some(candle) = last_candle {
            shared.set_last_candle(candle);
        }
        watchdog::arm(&shared, &clock, config.width_ms());

        feed.subscribe_candles(&config.symbol, config.timeframe)
            .await?;
        if config.include_trades {
            feed.subscribe_trades(&config.symbol).await?;
        }
        info!(
            symbol = %config.symbol,
            tf = %config.timeframe,
            trades = config.include_trades,
            "live channels subscribed"
        );

        let intake = Intake {
            feed,
            shared: Arc::clone(&shared),
            history: Arc::clone(&history),
            bus: bus.clone(),
            price_feed: Arc::clone(&price_feed),
            clock: Arc::clone(&clock),
            symbol: config.symbol.clone(),
            tf: config.timeframe,
            include_trades: config.include_trades,
        };
        let intake_task = tokio::spawn(intake.run());

        let processor = Processor::new(
            strategy,
            state,
            &config,
            Arc::clone(&shared),
            bus.clone(),
            price_feed,
            Arc::clone(&perf),
            Arc::clone(&clock),
        );
        let processor_task = tokio::spawn(processor.run());

        let perf_task = {
            let shared = Arc::clone(&shared);
            let clock = Arc::clone(&clock);
            let mut updates = perf.updates();
            tokio::spawn(async move {
                loop {
                    match updates.recv().await {
                        Ok(()) => shared.enqueue(QueueMessage {
                            kind: MessageKind::PerfTick,
                            sort_mts: clock.now_ms(),
                        }),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "perf updates lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            })
        };

        Ok(Self {
            config,
            shared,
            bus,
            clock,
            intake_task,
            perf_task,
            processor_task: Some(processor_task),
            final_state: None,
        })
    }

    /// Attach an observer to the engine's event stream.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.bus.subscribe()
    }

    /// The configuration this execution was started with.
    #[must_use]
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Whether the terminal state has been latched.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shared.is_stopped()
    }

    /// Atomically transform strategy state through the processor's serial
    /// discipline. The handler runs after everything queued ahead of it.
    pub fn invoke<F>(&self, handler: F) -> ExecResult<()>
    where
        F: FnOnce(S::State) -> S::State + Send + 'static,
    {
        if self.shared.is_stopped() {
            return Err(ExecError::Stopped);
        }
        self.shared.enqueue(QueueMessage {
            kind: MessageKind::Invoke(Box::new(handler)),
            sort_mts: self.clock.now_ms(),
        });
        Ok(())
    }

    /// Stop the execution: the in-flight callback completes, `on_end` runs
    /// and may adopt a final state, open positions are requested closed, and
    /// every later enqueue is discarded. Idempotent; the second call returns
    /// the same terminal state without touching the strategy again.
    pub async fn stop_execution(&mut self) -> ExecResult<()> {
        self.shared.stop();
        self.intake_task.abort();
        self.perf_task.abort();
        if let Some(task) = self.processor_task.take() {
            match task.await {
                Ok(state) => self.final_state = Some(state),
                Err(err) => error!(error = %err, "processor task join failed"),
            }
        }
        Ok(())
    }

    /// Final strategy state, available after `stop_execution` returns.
    #[must_use]
    pub fn final_state(&self) -> Option<&S::State> {
        self.final_state.as_ref()
    }

    /// Consume the handle and yield the final strategy state.
    #[must_use]
    pub fn into_final_state(mut self) -> Option<S::State> {
        self.final_state.take()
    }
}

impl<S: Strategy> Drop for StrategyExecution<S> {
    fn drop(&mut self) {
        self.intake_task.abort();
        self.perf_task.abort();
        self.shared.cancel_watchdog();
        if let Some(task) = &self.processor_task {
            task.abort();
        }
    }
}

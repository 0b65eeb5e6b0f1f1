//! Strategy trait definitions and the strategy-facing parameter block.
//!
//! A strategy is a capability set over an opaque state value: every callback
//! consumes the current state and returns the next one. The execution engine
//! is the sole owner of that value and guarantees callbacks run one at a
//! time, in stream order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sluice_core::{Amount, Candle, Position, Price, Symbol, Trade};
use thiserror::Error;

/// Result alias used within strategy implementations.
pub type StrategyResult<T> = Result<T, StrategyError>;

/// Failure variants surfaced by strategies.
#[derive(Debug, Error)]
pub enum StrategyError {
    /// Raised when a strategy's configuration cannot be parsed or is invalid.
    #[error("configuration is invalid: {0}")]
    InvalidConfig(String),
    /// Raised when the strategy lacks sufficient historical data to proceed.
    #[error("not enough historical data to compute indicators")]
    NotEnoughData,
    /// Used for all other errors that should bubble up to the caller.
    #[error("an internal strategy error occurred: {0}")]
    Internal(String),
}

/// Lifecycle hooks driven by the execution engine.
///
/// `State` is opaque to the engine; it only threads the value through the
/// callbacks and keeps a clone of the last value a callback returned
/// successfully. A failing callback therefore never corrupts state: the
/// engine retains the previous value and surfaces the error to observers.
pub trait Strategy: Send {
    /// Opaque state value threaded through every callback.
    type State: Clone + Send + 'static;

    /// Called for every historical candle replayed before going live.
    fn on_seed_candle(
        &mut self,
        state: Self::State,
        candle: &Candle,
    ) -> StrategyResult<Self::State>;

    /// Called exactly once per closed bar, with strictly increasing `mts`.
    fn on_candle(&mut self, state: Self::State, candle: &Candle) -> StrategyResult<Self::State>;

    /// Called for every live trade, with strictly increasing `id`.
    fn on_trade(&mut self, state: Self::State, trade: &Trade) -> StrategyResult<Self::State>;

    /// Called when the exchange reports one of the strategy's orders closed.
    /// The payload is forwarded verbatim; the engine does not interpret it.
    fn on_order(
        &mut self,
        state: Self::State,
        order: &serde_json::Value,
    ) -> StrategyResult<Self::State>;

    /// Called once when execution stops. The default is the identity, which
    /// is how a strategy opts out of teardown work.
    fn on_end(&mut self, state: Self::State) -> StrategyResult<Self::State> {
        Ok(state)
    }

    /// The open position for `symbol`, if any.
    fn position(&self, state: &Self::State, symbol: &str) -> Option<Position>;

    /// Request that all open positions be flattened. Invoked by the engine
    /// during shutdown when a position is still open.
    fn close_open_positions(&mut self, state: Self::State) -> StrategyResult<Self::State>;

    /// Realized profit and loss of the given open position.
    fn realized_pnl(&self, state: &Self::State, position: &Position) -> Price;

    /// Unrealized profit and loss of the given open position at `price`.
    fn unrealized_pnl(&self, state: &Self::State, position: &Position, price: Price) -> Price;
}

/// Engine options forwarded to the strategy.
///
/// The engine cannot inject fields into an opaque state value, so hosts read
/// this block from their execution config and fold it into the initial state
/// they construct.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct StrategyParams {
    pub use_max_leverage: bool,
    pub leverage: Option<Decimal>,
    pub increase_leverage: bool,
    pub max_leverage: Option<Decimal>,
    pub add_stop_order: bool,
    pub stop_order_percent: Option<Decimal>,
    pub is_derivative: bool,
    pub base_currency: Option<Symbol>,
    pub quote_currency: Option<Symbol>,
}

impl StrategyParams {
    /// Effective leverage after applying the `use_max_leverage` override.
    #[must_use]
    pub fn effective_leverage(&self) -> Option<Amount> {
        if self.use_max_leverage {
            self.max_leverage.or(self.leverage)
        } else {
            self.leverage
        }
    }
}

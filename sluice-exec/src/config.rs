//! Engine construction options.

use sluice_core::{CandlePrice, Symbol, Timeframe};
use sluice_strategy::StrategyParams;

use crate::error::{ExecError, ExecResult};

/// Number of historical candles replayed through `on_seed_candle` when the
/// caller does not override it.
pub const DEFAULT_SEED_CANDLE_COUNT: usize = 5_000;

/// Options the engine is constructed around.
#[derive(Clone, Debug)]
pub struct ExecutionConfig {
    /// Market identifier passed to all subscriptions and fetches.
    pub symbol: Symbol,
    /// Bar width driving candle subscriptions, alignment and the watchdog.
    pub timeframe: Timeframe,
    /// Whether to subscribe to and process the public trade channel.
    pub include_trades: bool,
    /// Number of historical candles replayed before going live.
    pub seed_candle_count: usize,
    /// Which OHLC field is fed to the price feed.
    pub candle_price: CandlePrice,
    /// Options forwarded to the strategy.
    pub params: StrategyParams,
}

impl ExecutionConfig {
    pub fn new(symbol: impl Into<Symbol>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            include_trades: false,
            seed_candle_count: DEFAULT_SEED_CANDLE_COUNT,
            candle_price: CandlePrice::default(),
            params: StrategyParams::default(),
        }
    }

    #[must_use]
    pub fn with_trades(mut self, include_trades: bool) -> Self {
        self.include_trades = include_trades;
        self
    }

    #[must_use]
    pub fn with_seed_candle_count(mut self, count: usize) -> Self {
        self.seed_candle_count = count;
        self
    }

    #[must_use]
    pub fn with_candle_price(mut self, field: CandlePrice) -> Self {
        self.candle_price = field;
        self
    }

    #[must_use]
    pub fn with_params(mut self, params: StrategyParams) -> Self {
        self.params = params;
        self
    }

    /// Options forwarded to the strategy; hosts fold these into the initial
    /// state they construct.
    #[must_use]
    pub fn strategy_params(&self) -> &StrategyParams {
        &self.params
    }

    /// Bucket width of the configured timeframe in milliseconds.
    #[must_use]
    pub fn width_ms(&self) -> i64 {
        self.timeframe.width_ms()
    }

    pub(crate) fn validate(&self) -> ExecResult<()> {
        if self.symbol.trim().is_empty() {
            return Err(ExecError::Config("symbol must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = ExecutionConfig::new("tBTCUSD", Timeframe::OneMinute);
        assert_eq!(config.seed_candle_count, DEFAULT_SEED_CANDLE_COUNT);
        assert_eq!(config.candle_price, CandlePrice::Close);
        assert!(!config.include_trades);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_symbol_is_rejected() {
        let config = ExecutionConfig::new("  ", Timeframe::OneMinute);
        assert!(matches!(config.validate(), Err(ExecError::Config(_))));
    }
}

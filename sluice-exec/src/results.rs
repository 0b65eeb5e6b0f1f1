//! Result snapshots broadcast to observers after each processed event.

use rust_decimal::{Decimal, MathematicalOps};
use serde::Serialize;
use sluice_core::{Candle, Mts, Position, Price, Symbol, Timeframe, Trade, Wallet};

use crate::perf::PerfTracker;

/// An open position enriched with its profit and loss figures.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PositionReport {
    pub position: Position,
    pub realized_pnl: Price,
    pub unrealized_pnl: Price,
}

/// Point-in-time view of the injected performance tracker.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PerfReport {
    pub allocation: Price,
    pub position_size: Price,
    pub current_allocation: Price,
    pub available_funds: Price,
    pub total_return: Price,
    pub return_perc: Price,
    pub drawdown: Price,
    pub equity_curve: Vec<Price>,
}

impl PerfReport {
    /// Read every figure from the tracker.
    pub fn collect(perf: &dyn PerfTracker) -> Self {
        Self {
            allocation: perf.allocation(),
            position_size: perf.position_size(),
            current_allocation: perf.current_allocation(),
            available_funds: perf.available_funds(),
            total_return: perf.total_return(),
            return_perc: perf.return_perc(),
            drawdown: perf.drawdown(),
            equity_curve: perf.equity_curve(),
        }
    }
}

/// Summary statistics over the equity curve.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct EquityStats {
    pub mean: Decimal,
    pub min: Decimal,
    pub max: Decimal,
    pub std_dev: Decimal,
}

impl EquityStats {
    /// Compute stats over `values`; `None` for an empty slice.
    #[must_use]
    pub fn compute(values: &[Decimal]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        Some(Self {
            mean: mean(values),
            min: values.iter().copied().min().expect("non-empty"),
            max: values.iter().copied().max().expect("non-empty"),
            std_dev: std_dev(values),
        })
    }
}

/// Full execution results snapshot carried by `rt_execution_results`.
#[derive(Clone, Debug, Serialize)]
pub struct ResultsSnapshot {
    pub symbol: Symbol,
    pub tf: Timeframe,
    /// Stream timestamp of the event that produced this snapshot.
    pub generated_at: Mts,
    /// Price the snapshot was computed against, when one was known.
    pub price: Option<Price>,
    /// Every candle closed so far, in closure order.
    pub candles: Vec<Candle>,
    /// Every trade processed so far, in processing order.
    pub trades: Vec<Trade>,
    pub wallets: Vec<Wallet>,
    pub open_position: Option<PositionReport>,
    pub perf: PerfReport,
    pub equity_stats: Option<EquityStats>,
}

pub(crate) fn sum(values: &[Decimal]) -> Decimal {
    values.iter().copied().sum()
}

pub(crate) fn mean(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    sum(values) / Decimal::from(values.len())
}

pub(crate) fn std_dev(values: &[Decimal]) -> Decimal {
    if values.len() < 2 {
        return Decimal::ZERO;
    }
    let mu = mean(values);
    let variance = values
        .iter()
        .map(|value| {
            let diff = *value - mu;
            diff * diff
        })
        .sum::<Decimal>()
        / Decimal::from(values.len());
    variance.sqrt().unwrap_or(Decimal::ZERO)
}

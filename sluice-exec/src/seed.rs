//! Historical seeding: warm the strategy's indicators before going live.

use tracing::{debug, info};

use sluice_core::{Candle, Clock};
use sluice_strategy::Strategy;

use crate::config::ExecutionConfig;
use crate::error::{ExecError, ExecResult};
use crate::feed::CandleQuery;
use crate::throttle::ThrottledHistory;

/// Maximum candles per history request.
pub(crate) const PAGE_LIMIT: usize = 1_000;

/// Replay up to `seed_candle_count` historical candles through
/// `on_seed_candle`, ascending, deduplicated on `mts`.
///
/// Runs to completion before any live subscription is opened. Fetch and
/// callback failures are fatal here and abort `execute`.
pub(crate) async fn run<S: Strategy>(
    strategy: &mut S,
    state: S::State,
    config: &ExecutionConfig,
    history: &ThrottledHistory,
    clock: &dyn Clock,
) -> ExecResult<(S::State, Option<Candle>)> {
    let mut state = state;
    let mut last_candle: Option<Candle> = None;
    if config.seed_candle_count == 0 {
        return Ok((state, last_candle));
    }

    let width = config.timeframe.width_ms();
    let aligned_end = config.timeframe.align_down(clock.now_ms());
    let seed_start = aligned_end - config.seed_candle_count as i64 * width;
    let pages = config.seed_candle_count.div_ceil(PAGE_LIMIT);
    let mut seeded = 0usize;

    for page in 0..pages {
        let window_start = seed_start + (page * PAGE_LIMIT) as i64 * width;
        let window_end = (window_start + PAGE_LIMIT as i64 * width).min(aligned_end);
        let query = CandleQuery::new(config.symbol.clone(), config.timeframe)
            .with_range(window_start, window_end)
            .with_limit(PAGE_LIMIT);
        debug!(page, window_start, window_end, "fetching seed window");
        let candles = history.candles(&query).await.map_err(ExecError::Seed)?;

        for mut candle in candles {
            if let Some(last) = &last_candle {
                if candle.mts <= last.mts {
                    continue;
                }
            }
            candle.symbol = config.symbol.clone();
            candle.tf = config.timeframe;
            state = strategy.on_seed_candle(state, &candle)?;
            last_candle = Some(candle);
            seeded += 1;
        }
    }

    info!(
        symbol = %config.symbol,
        tf = %config.timeframe,
        seeded,
        "strategy seeded"
    );
    Ok((state, last_candle))
}

//! Gap filling for historical candle series.
//!
//! Exchanges omit buckets with no trades, but indicator warm-up and gap
//! back-fill need a dense series. Missing buckets are filled with flat
//! zero-volume candles carrying the previous close; a gap before the first
//! real candle is back-projected from that candle's close.

use std::collections::BTreeMap;

use sluice_core::{Amount, Candle, Mts, Timeframe};

/// Fill every bucket of `[start, end)` exactly once.
///
/// `start` and `end` are expected to be aligned to the timeframe width; the
/// output then has `(end - start) / width` candles with `mts` equal to
/// `start + k * width`. A real candle always wins over a synthetic one at
/// the same `mts`. An empty input yields an empty output, as there is no
/// close to project from.
#[must_use]
pub fn pad_candles(candles: Vec<Candle>, tf: Timeframe, start: Mts, end: Mts) -> Vec<Candle> {
    let width = tf.width_ms();
    if candles.is_empty() || end <= start {
        return Vec::new();
    }

    let mut by_mts: BTreeMap<Mts, Candle> = BTreeMap::new();
    for candle in candles {
        // Later duplicates replace earlier ones; the exchange re-emits a
        // bucket when it updates.
        by_mts.insert(candle.mts, candle);
    }
    let first = by_mts
        .values()
        .next()
        .expect("non-empty input has a first candle");
    let template_symbol = first.symbol.clone();
    let first_close = first.close;

    let mut out = Vec::with_capacity(((end - start) / width) as usize);
    let mut prev_close = None;
    let mut mts = start;
    while mts < end {
        match by_mts.get(&mts) {
            Some(real) => {
                prev_close = Some(real.close);
                out.push(real.clone());
            }
            None => {
                let close = prev_close.unwrap_or(first_close);
                out.push(Candle {
                    symbol: template_symbol.clone(),
                    tf,
                    mts,
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: Amount::ZERO,
                });
            }
        }
        mts += width;
    }
    out
}

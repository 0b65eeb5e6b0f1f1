//! Fundamental data types shared across the entire workspace.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Alias for price precision.
pub type Price = Decimal;
/// Alias for signed quantity precision.
pub type Amount = Decimal;
/// Alias used for human-readable market symbols (e.g., `tBTCUSD`).
pub type Symbol = String;
/// Epoch timestamp in milliseconds, the unit exchanges stamp on wire data.
pub type Mts = i64;

/// Raised when a timeframe label cannot be resolved.
#[derive(Debug, Error)]
#[error("unsupported timeframe '{0}'")]
pub struct TimeframeParseError(String);

/// Bar width identifier used when aggregating trades into candles.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "3h")]
    ThreeHours,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "12h")]
    TwelveHours,
    #[serde(rename = "1D")]
    OneDay,
    #[serde(rename = "1W")]
    OneWeek,
}

impl Timeframe {
    /// Width of one bucket in milliseconds.
    #[must_use]
    pub const fn width_ms(self) -> i64 {
        const MINUTE: i64 = 60_000;
        match self {
            Self::OneMinute => MINUTE,
            Self::FiveMinutes => 5 * MINUTE,
            Self::FifteenMinutes => 15 * MINUTE,
            Self::ThirtyMinutes => 30 * MINUTE,
            Self::OneHour => 60 * MINUTE,
            Self::ThreeHours => 180 * MINUTE,
            Self::SixHours => 360 * MINUTE,
            Self::TwelveHours => 720 * MINUTE,
            Self::OneDay => 1_440 * MINUTE,
            Self::OneWeek => 7 * 1_440 * MINUTE,
        }
    }

    /// Canonical label as used in subscription keys (e.g. `1m`, `1D`).
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::ThirtyMinutes => "30m",
            Self::OneHour => "1h",
            Self::ThreeHours => "3h",
            Self::SixHours => "6h",
            Self::TwelveHours => "12h",
            Self::OneDay => "1D",
            Self::OneWeek => "1W",
        }
    }

    /// Align a timestamp down to the start of its bucket.
    #[must_use]
    pub const fn align_down(self, mts: Mts) -> Mts {
        let width = self.width_ms();
        mts - mts.rem_euclid(width)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = TimeframeParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "1m" | "1min" | "1minute" => Ok(Self::OneMinute),
            "5m" | "5min" | "5minutes" => Ok(Self::FiveMinutes),
            "15m" | "15min" | "15minutes" => Ok(Self::FifteenMinutes),
            "30m" | "30min" | "30minutes" => Ok(Self::ThirtyMinutes),
            "1h" | "60m" | "1hour" => Ok(Self::OneHour),
            "3h" | "180m" | "3hours" => Ok(Self::ThreeHours),
            "6h" | "6hours" => Ok(Self::SixHours),
            "12h" | "12hours" => Ok(Self::TwelveHours),
            "1d" | "d" | "day" => Ok(Self::OneDay),
            "1w" | "w" | "7d" | "week" => Ok(Self::OneWeek),
            other => Err(TimeframeParseError(other.to_string())),
        }
    }
}

/// Which OHLC field is forwarded to the price feed.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CandlePrice {
    Open,
    High,
    Low,
    #[default]
    Close,
}

/// Aggregated OHLCV bar over the bucket `[mts, mts + width)`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Candle {
    pub symbol: Symbol,
    pub tf: Timeframe,
    pub mts: Mts,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: Amount,
}

impl Candle {
    /// Extract the configured OHLC field.
    #[must_use]
    pub fn price(&self, field: CandlePrice) -> Price {
        match field {
            CandlePrice::Open => self.open,
            CandlePrice::High => self.high,
            CandlePrice::Low => self.low,
            CandlePrice::Close => self.close,
        }
    }

    /// Whether the bar timestamp sits on a bucket boundary of its timeframe.
    #[must_use]
    pub fn is_aligned(&self) -> bool {
        self.tf.align_down(self.mts) == self.mts
    }

    /// Build the flat bar that follows this one: same close everywhere, zero
    /// volume, stamped one bucket later. Used by gap padding and the closure
    /// watchdog.
    #[must_use]
    pub fn next_synthetic(&self) -> Candle {
        Candle {
            symbol: self.symbol.clone(),
            tf: self.tf,
            mts: self.mts + self.tf.width_ms(),
            open: self.close,
            high: self.close,
            low: self.close,
            close: self.close,
            volume: Amount::ZERO,
        }
    }
}

/// A single public trade as emitted by the exchange.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Trade {
    pub id: i64,
    pub mts: Mts,
    pub price: Price,
    pub amount: Amount,
    pub symbol: Symbol,
}

/// A wallet entry; identity is the `(currency, kind)` pair.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Wallet {
    pub currency: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub balance: Amount,
    #[serde(rename = "balanceAvailable")]
    pub balance_available: Amount,
}

impl Wallet {
    /// Whether `other` refers to the same wallet identity.
    #[must_use]
    pub fn same_identity(&self, other: &Wallet) -> bool {
        self.currency == other.currency && self.kind == other.kind
    }
}

/// An open position as reported by the strategy.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Position {
    pub symbol: Symbol,
    /// Signed size; positive long, negative short.
    pub amount: Amount,
    /// Volume-weighted entry price.
    pub base_price: Price,
}

/// Source of wall-clock time, injectable so wall-clock behavior is testable.
pub trait Clock: Send + Sync {
    /// Current time as epoch milliseconds.
    fn now_ms(&self) -> Mts;
}

/// Production clock backed by the system time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> Mts {
        Utc::now().timestamp_millis()
    }
}

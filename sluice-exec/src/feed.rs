//! Exchange-facing collaborator contracts.
//!
//! The engine never talks to a socket or a REST endpoint directly: candle
//! history and the live event stream are injected behind these traits, and
//! concerns like authentication and socket reconnection belong entirely to
//! the implementations. The engine only reacts to the `SocketOpened` /
//! `SocketClosed` notifications a connection chooses to surface.

use async_trait::async_trait;
use serde_json::Value;
use sluice_core::{Candle, Mts, Symbol, Timeframe, Trade, Wallet};
use thiserror::Error;

/// Convenience alias for feed results.
pub type FeedResult<T> = Result<T, FeedError>;

/// Common error type returned by feed implementations.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Represents transport-level failures (network, timeouts, etc.).
    #[error("transport error: {0}")]
    Transport(String),
    /// Exchange responded with a business error.
    #[error("exchange error: {0}")]
    Exchange(String),
    /// Wraps serialization or parsing errors.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// A catch-all branch for other issues.
    #[error("unexpected error: {0}")]
    Other(String),
}

/// A single normalized message from the live feed.
#[derive(Clone, Debug)]
pub enum FeedEvent {
    /// One candle, closed or still updating.
    Candle(Candle),
    /// Historical snapshot delivered on subscription; the seeder owns
    /// history, so the engine drops these.
    CandleSnapshot(Vec<Candle>),
    /// One public trade.
    Trade(Trade),
    /// Historical trade snapshot; dropped like candle snapshots.
    TradeSnapshot(Vec<Trade>),
    /// One of the strategy's orders closed. The payload is opaque to the
    /// engine and forwarded to the strategy verbatim.
    OrderClosed(Value),
    /// Full replacement of the wallet set.
    WalletSnapshot(Vec<Wallet>),
    /// Mutation of a single wallet entry.
    WalletUpdate(Wallet),
    /// The underlying socket (re)connected.
    SocketOpened,
    /// The underlying socket dropped.
    SocketClosed,
    /// A frame the connection could not classify.
    Raw { channel: String, payload: Value },
}

/// REST history section selector.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum HistorySection {
    #[default]
    Hist,
    Last,
}

impl HistorySection {
    /// Path segment used by the wire API.
    #[must_use]
    pub const fn as_path(self) -> &'static str {
        match self {
            Self::Hist => "hist",
            Self::Last => "last",
        }
    }
}

/// Result ordering requested from the history endpoint.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    /// Wire representation (`1` ascending, `-1` descending).
    #[must_use]
    pub const fn as_wire(self) -> i8 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }
}

/// Parameters of one historical candle fetch.
#[derive(Clone, Debug)]
pub struct CandleQuery {
    pub symbol: Symbol,
    pub tf: Timeframe,
    pub section: HistorySection,
    pub start: Option<Mts>,
    pub end: Option<Mts>,
    pub limit: Option<usize>,
    pub sort: SortOrder,
}

impl CandleQuery {
    /// Build a query for the `hist` section, sorted ascending.
    pub fn new(symbol: impl Into<Symbol>, tf: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            tf,
            section: HistorySection::Hist,
            start: None,
            end: None,
            limit: None,
            sort: SortOrder::Ascending,
        }
    }

    /// Restrict the query to `[start, end]` (inclusive, epoch ms).
    #[must_use]
    pub fn with_range(mut self, start: Mts, end: Mts) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// Cap the number of returned candles.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Provides access to historical candle data.
#[async_trait]
pub trait CandleHistory: Send + Sync {
    /// Fetch a chunk of historical candles, ascending by `mts` when the
    /// query requests ascending order.
    async fn candles(&self, query: &CandleQuery) -> FeedResult<Vec<Candle>>;
}

/// Live subscription primitive the engine attaches to.
#[async_trait]
pub trait FeedConnection: Send {
    /// Subscribe to the candle channel for `symbol` at `tf`.
    async fn subscribe_candles(&mut self, symbol: &str, tf: Timeframe) -> FeedResult<()>;

    /// Subscribe to the public trade channel for `symbol`.
    async fn subscribe_trades(&mut self, symbol: &str) -> FeedResult<()>;

    /// Await the next event. `Ok(None)` means the stream has ended for good.
    async fn next_event(&mut self) -> FeedResult<Option<FeedEvent>>;
}

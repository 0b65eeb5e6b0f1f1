//! Rate-limited wrapper over the candle history endpoint.
//!
//! One `ThrottledHistory` is shared by the seeder and the pause/resume
//! back-fill, so the limit is global across the engine. The bucket holds a
//! single token refilling at ten requests per sixty seconds; excess calls
//! queue in arrival order. Failures surface to the caller untouched, with no
//! automatic retry.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{direct::NotKeyed, InMemoryState},
    Quota, RateLimiter,
};

use crate::feed::{CandleHistory, CandleQuery, FeedResult};
use sluice_core::Candle;

const REQUESTS_PER_WINDOW: u32 = 10;
const WINDOW: Duration = Duration::from_secs(60);

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// The production quota: capacity one, refilling ten per sixty seconds.
#[must_use]
pub fn default_quota() -> Quota {
    let period = WINDOW / REQUESTS_PER_WINDOW;
    Quota::with_period(period)
        .expect("non-zero refill period")
        .allow_burst(NonZeroU32::MIN)
}

/// Token-bucket gate in front of a [`CandleHistory`] implementation.
pub struct ThrottledHistory {
    inner: Arc<dyn CandleHistory>,
    limiter: DirectLimiter,
}

impl ThrottledHistory {
    /// Wrap `inner` with the production quota.
    pub fn new(inner: Arc<dyn CandleHistory>) -> Self {
        Self::with_quota(inner, default_quota())
    }

    /// Wrap `inner` with an explicit quota.
    pub fn with_quota(inner: Arc<dyn CandleHistory>, quota: Quota) -> Self {
        Self {
            inner,
            limiter: RateLimiter::direct(quota),
        }
    }

    /// Fetch candles once a token is available.
    pub async fn candles(&self, query: &CandleQuery) -> FeedResult<Vec<Candle>> {
        self.limiter.until_ready().await;
        self.inner.candles(query).await
    }
}

#[async_trait]
impl CandleHistory for ThrottledHistory {
    async fn candles(&self, query: &CandleQuery) -> FeedResult<Vec<Candle>> {
        ThrottledHistory::candles(self, query).await
    }
}

//! In-memory candle history with scripted failures.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use sluice_core::Candle;
use sluice_exec::{CandleHistory, CandleQuery, FeedError, FeedResult, SortOrder};

/// Serves a fixed candle set, recording every query it answers.
#[derive(Default)]
pub struct StaticHistory {
    candles: Mutex<Vec<Candle>>,
    queries: Mutex<Vec<CandleQuery>>,
    failures: Mutex<VecDeque<FeedError>>,
}

impl StaticHistory {
    #[must_use]
    pub fn new(candles: Vec<Candle>) -> Self {
        Self {
            candles: Mutex::new(candles),
            queries: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
        }
    }

    /// Script the next call to fail with `error` instead of answering.
    pub fn push_failure(&self, error: FeedError) {
        self.failures.lock().unwrap().push_back(error);
    }

    /// Every query answered so far, in arrival order.
    #[must_use]
    pub fn queries(&self) -> Vec<CandleQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl CandleHistory for StaticHistory {
    async fn candles(&self, query: &CandleQuery) -> FeedResult<Vec<Candle>> {
        self.queries.lock().unwrap().push(query.clone());
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        let mut out: Vec<Candle> = self
            .candles
            .lock()
            .unwrap()
            .iter()
            .filter(|candle| {
                candle.tf == query.tf
                    && query.start.map_or(true, |start| candle.mts >= start)
                    && query.end.map_or(true, |end| candle.mts <= end)
            })
            .cloned()
            .collect();
        match query.sort {
            SortOrder::Ascending => out.sort_by_key(|candle| candle.mts),
            SortOrder::Descending => out.sort_by_key(|candle| std::cmp::Reverse(candle.mts)),
        }
        if let Some(limit) = query.limit {
            out.truncate(limit);
        }
        Ok(out)
    }
}

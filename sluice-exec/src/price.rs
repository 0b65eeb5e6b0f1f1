//! Scalar price feed collaborator.

use std::sync::RwLock;

use sluice_core::{Mts, Price};

/// One observed price with its source timestamp.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PricePoint {
    pub price: Price,
    pub mts: Mts,
}

/// Injected sink for scalar price updates.
///
/// The engine is the caller responsible for `mts` monotonicity: it keeps a
/// single watermark across every update source (trade prices and candle
/// prices) and only pushes strictly newer values.
pub trait PriceFeed: Send + Sync {
    /// Record a new price observation.
    fn update(&self, price: Price, mts: Mts);

    /// The most recently recorded observation, if any.
    fn last(&self) -> Option<PricePoint>;
}

/// Default in-memory implementation.
#[derive(Debug, Default)]
pub struct SharedPriceFeed {
    inner: RwLock<Option<PricePoint>>,
}

impl SharedPriceFeed {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PriceFeed for SharedPriceFeed {
    fn update(&self, price: Price, mts: Mts) {
        *self.inner.write().expect("price feed lock poisoned") = Some(PricePoint { price, mts });
    }

    fn last(&self) -> Option<PricePoint> {
        *self.inner.read().expect("price feed lock poisoned")
    }
}

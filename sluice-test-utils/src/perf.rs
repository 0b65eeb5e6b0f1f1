//! Performance tracker stub with settable figures and manual update ticks.

use std::sync::Mutex;

use rust_decimal::Decimal;
use tokio::sync::broadcast;

use sluice_core::{Amount, Price};
use sluice_exec::PerfTracker;

/// Tracker whose figures are whatever the test last set.
pub struct StaticPerf {
    tx: broadcast::Sender<()>,
    allocation: Mutex<Price>,
    position_size: Mutex<Amount>,
    current_allocation: Mutex<Price>,
    available_funds: Mutex<Price>,
    equity_curve: Mutex<Vec<Price>>,
    total_return: Mutex<Price>,
    return_perc: Mutex<Price>,
    drawdown: Mutex<Price>,
}

impl StaticPerf {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            tx,
            allocation: Mutex::new(Decimal::ZERO),
            position_size: Mutex::new(Decimal::ZERO),
            current_allocation: Mutex::new(Decimal::ZERO),
            available_funds: Mutex::new(Decimal::ZERO),
            equity_curve: Mutex::new(Vec::new()),
            total_return: Mutex::new(Decimal::ZERO),
            return_perc: Mutex::new(Decimal::ZERO),
            drawdown: Mutex::new(Decimal::ZERO),
        }
    }

    /// Emit one update tick to subscribers.
    pub fn tick(&self) {
        let _ = self.tx.send(());
    }

    pub fn set_equity_curve(&self, curve: Vec<Price>) {
        *self.equity_curve.lock().unwrap() = curve;
    }

    pub fn set_available_funds(&self, funds: Price) {
        *self.available_funds.lock().unwrap() = funds;
    }
}

impl Default for StaticPerf {
    fn default() -> Self {
        Self::new()
    }
}

impl PerfTracker for StaticPerf {
    fn allocation(&self) -> Price {
        *self.allocation.lock().unwrap()
    }

    fn position_size(&self) -> Amount {
        *self.position_size.lock().unwrap()
    }

    fn current_allocation(&self) -> Price {
        *self.current_allocation.lock().unwrap()
    }

    fn available_funds(&self) -> Price {
        *self.available_funds.lock().unwrap()
    }

    fn equity_curve(&self) -> Vec<Price> {
        self.equity_curve.lock().unwrap().clone()
    }

    fn total_return(&self) -> Price {
        *self.total_return.lock().unwrap()
    }

    fn return_perc(&self) -> Price {
        *self.return_perc.lock().unwrap()
    }

    fn drawdown(&self) -> Price {
        *self.drawdown.lock().unwrap()
    }

    fn updates(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }
}

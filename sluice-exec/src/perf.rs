//! Performance manager collaborator contract.

use tokio::sync::broadcast;

use sluice_core::{Amount, Price};

/// Injected aggregate of portfolio performance figures.
///
/// The engine never computes these itself; it reads a fresh report whenever
/// it emits results, and forwards the tracker's update ticks through the
/// serial processor so observers see them in stream order.
pub trait PerfTracker: Send + Sync {
    fn allocation(&self) -> Price;
    fn position_size(&self) -> Amount;
    fn current_allocation(&self) -> Price;
    fn available_funds(&self) -> Price;
    fn equity_curve(&self) -> Vec<Price>;
    fn total_return(&self) -> Price;
    fn return_perc(&self) -> Price;
    fn drawdown(&self) -> Price;

    /// Subscribe to the tracker's update ticks.
    fn updates(&self) -> broadcast::Receiver<()>;
}

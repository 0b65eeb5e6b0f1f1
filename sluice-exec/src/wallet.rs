//! Wallet set maintained from authenticated feed messages.

use sluice_core::Wallet;
use tracing::debug;

/// The engine's view of the account wallets, keyed by `(currency, type)`.
///
/// Snapshots replace the full set; updates mutate exactly one entry.
#[derive(Debug, Default)]
pub struct WalletBook {
    entries: Vec<Wallet>,
}

impl WalletBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the full wallet set.
    pub fn apply_snapshot(&mut self, wallets: Vec<Wallet>) {
        debug!(wallets = wallets.len(), "wallet snapshot received");
        self.entries = wallets;
    }

    /// Mutate the matching entry, if any.
    ///
    /// A zero balance or available balance in the update is skipped rather
    /// than applied; upstream treats zero as absent and that behavior is
    /// preserved here. Updates with no matching entry are ignored.
    pub fn apply_update(&mut self, update: &Wallet) {
        let Some(entry) = self
            .entries
            .iter_mut()
            .find(|wallet| wallet.same_identity(update))
        else {
            debug!(
                currency = %update.currency,
                kind = %update.kind,
                "ignoring wallet update with no matching entry"
            );
            return;
        };
        if !update.balance.is_zero() {
            entry.balance = update.balance;
        }
        if !update.balance_available.is_zero() {
            entry.balance_available = update.balance_available;
        }
    }

    /// Current wallet entries in snapshot order.
    #[must_use]
    pub fn entries(&self) -> &[Wallet] {
        &self.entries
    }
}

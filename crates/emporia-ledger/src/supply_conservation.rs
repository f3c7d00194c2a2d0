//! Supply conservation check.
//!
//! Enforced after every matched round:
//! ```text
//! ∀ key: Σ(accounts) == Σ(deposits) - Σ(withdrawals)
//! ```
//!
//! `key` is either an asset balance or an item holding. Matching only moves
//! value between an account and the house, so a mismatch means the engine
//! is broken and the round is marked faulted.

use std::collections::BTreeMap;

use emporia_types::{EmporiaError, LedgerKey, Result};
use rust_decimal::Decimal;

/// Running per-key totals of everything that entered or left the ledger.
#[derive(Debug, Clone, Default)]
pub struct SupplyConservation {
    deposits: BTreeMap<LedgerKey, Decimal>,
    withdrawals: BTreeMap<LedgerKey, Decimal>,
}

impl SupplyConservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_deposit(&mut self, key: &LedgerKey, amount: Decimal) {
        *self.deposits.entry(key.clone()).or_insert(Decimal::ZERO) += amount;
    }

    pub fn record_withdrawal(&mut self, key: &LedgerKey, amount: Decimal) {
        *self.withdrawals.entry(key.clone()).or_insert(Decimal::ZERO) += amount;
    }

    /// Expected total for a key: deposits - withdrawals.
    #[must_use]
    pub fn expected_supply(&self, key: &LedgerKey) -> Decimal {
        self.total_deposits(key) - self.total_withdrawals(key)
    }

    /// Compare the actual total across all accounts against the expected one.
    ///
    /// # Errors
    /// Returns [`EmporiaError::SupplyInvariantViolation`] if they differ.
    pub fn verify(&self, key: &LedgerKey, actual_supply: Decimal) -> Result<()> {
        let expected = self.expected_supply(key);
        if actual_supply != expected {
            return Err(EmporiaError::SupplyInvariantViolation {
                reason: format!(
                    "{key:?}: actual supply {actual_supply} != expected {expected} \
                     (deposits={}, withdrawals={})",
                    self.total_deposits(key),
                    self.total_withdrawals(key),
                ),
            });
        }
        Ok(())
    }

    /// Every key that ever saw a deposit or withdrawal, in sorted order.
    #[must_use]
    pub fn tracked_keys(&self) -> Vec<LedgerKey> {
        let mut keys: Vec<LedgerKey> = self.deposits.keys().cloned().collect();
        keys.extend(
            self.withdrawals
                .keys()
                .filter(|k| !self.deposits.contains_key(*k))
                .cloned(),
        );
        keys.sort();
        keys
    }

    #[must_use]
    pub fn total_deposits(&self, key: &LedgerKey) -> Decimal {
        self.deposits.get(key).copied().unwrap_or(Decimal::ZERO)
    }

    #[must_use]
    pub fn total_withdrawals(&self, key: &LedgerKey) -> Decimal {
        self.withdrawals.get(key).copied().unwrap_or(Decimal::ZERO)
    }
}

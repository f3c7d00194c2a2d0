//! Ledger account types.
//!
//! An account holds fungible `balances` (what intents pay with) and
//! `holdings` of items (what intents trade). Both are non-negative.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::AccountId;

/// Type alias for asset identifiers (e.g., "USD", "GOLD").
pub type Asset = String;

/// Type alias for item identifiers (e.g., "X", "WIDGET").
pub type Item = String;

/// A single ledger account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Ed25519 verifying key of the account holder. Delegations must be
    /// signed by the matching signing key.
    pub holder_key: [u8; 32],
    /// Asset → balance.
    pub balances: BTreeMap<Asset, Decimal>,
    /// Item → quantity held.
    pub holdings: BTreeMap<Item, Decimal>,
}

impl Account {
    /// Create an empty account.
    #[must_use]
    pub fn new(id: AccountId, holder_key: [u8; 32]) -> Self {
        Self {
            id,
            holder_key,
            balances: BTreeMap::new(),
            holdings: BTreeMap::new(),
        }
    }

    /// Balance of an asset (zero when never funded).
    #[must_use]
    pub fn balance(&self, asset: &str) -> Decimal {
        self.balances.get(asset).copied().unwrap_or(Decimal::ZERO)
    }

    /// Quantity held of an item (zero when never held).
    #[must_use]
    pub fn holding(&self, item: &str) -> Decimal {
        self.holdings.get(item).copied().unwrap_or(Decimal::ZERO)
    }

    /// Whether every balance and holding is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.balances.values().all(Decimal::is_zero) && self.holdings.values().all(Decimal::is_zero)
    }
}

/// Read-only access to ledger state.
///
/// This is all a running program can see: it can never mutate through it.
pub trait LedgerView {
    /// Balance of `asset` in `account`, or `None` if the account is unknown.
    fn get_balance(&self, account: &AccountId, asset: &str) -> Option<Decimal>;

    /// Holdings of `item` in `account`, or `None` if the account is unknown.
    fn get_holdings(&self, account: &AccountId, item: &str) -> Option<Decimal>;
}

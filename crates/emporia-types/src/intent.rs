//! Intents emitted by running programs and the ledger deltas they produce.
//!
//! An [`Intent`] is a proposed trade between one account and the market's
//! house account. It is only a proposal: the matching engine re-checks funds
//! and holdings when it applies the intent.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, Asset, Item};

/// Which way the account trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentSide {
    /// Pay `quantity × price` of the asset, receive `quantity` of the item.
    Buy,
    /// Give `quantity` of the item, receive `quantity × price` of the asset.
    Sell,
}

impl std::fmt::Display for IntentSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// A single proposed buy/sell action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub account: AccountId,
    pub side: IntentSide,
    pub item: Item,
    pub asset: Asset,
    pub quantity: Decimal,
    pub price: Decimal,
}

impl Intent {
    /// `quantity × price`, or `None` on overflow.
    #[must_use]
    pub fn notional(&self) -> Option<Decimal> {
        self.quantity.checked_mul(self.price)
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} @ {} {} for {}",
            self.side, self.quantity, self.item, self.price, self.asset, self.account,
        )
    }
}

/// Which ledger cell a delta touched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKey {
    Balance(Asset),
    Holding(Item),
}

/// One applied change to one ledger cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerDelta {
    pub account: AccountId,
    pub key: LedgerKey,
    /// Signed change.
    pub change: Decimal,
    /// Value after the change.
    pub after: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(side: IntentSide) -> Intent {
        Intent {
            account: AccountId::from_bytes([1; 16]),
            side,
            item: "X".into(),
            asset: "USD".into(),
            quantity: Decimal::new(80, 0),
            price: Decimal::new(25, 1),
        }
    }

    #[test]
    fn notional_is_quantity_times_price() {
        assert_eq!(intent(IntentSide::Sell).notional(), Some(Decimal::new(200, 0)));
    }

    #[test]
    fn notional_overflow_is_none() {
        let mut i = intent(IntentSide::Buy);
        i.quantity = Decimal::MAX;
        i.price = Decimal::new(2, 0);
        assert!(i.notional().is_none());
    }

    #[test]
    fn display_mentions_side_and_item() {
        let s = format!("{}", intent(IntentSide::Sell));
        assert!(s.starts_with("SELL 80 X"));
    }

    #[test]
    fn side_ordering() {
        assert!(IntentSide::Buy < IntentSide::Sell);
    }
}

//! # emporia-ledger
//!
//! The ledger owned by each market: per-account balances (assets) and
//! holdings (items), mutated one [`Intent`](emporia_types::Intent) at a time.
//!
//! ## Guarantees
//!
//! - No balance or holding ever goes negative. Every debit is checked
//!   against the current value before anything is written.
//! - Applying an intent is all-or-nothing: either every delta lands or the
//!   ledger is unchanged.
//! - Matching never creates or destroys value. Every intent trades against
//!   the market's house account, and [`SupplyConservation`] checks that
//!   totals only move through `deposit` and `withdraw`.

pub mod ledger;
pub mod supply_conservation;

pub use ledger::{Ledger, LedgerSnapshot};
pub use supply_conservation::SupplyConservation;

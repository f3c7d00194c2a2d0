//! Account ledger for one market.
//!
//! Holds every account's balances and holdings plus the market's house
//! account. Intents are applied one at a time: all checks run first, then
//! all writes, so a rejected intent leaves the ledger untouched.

use std::collections::BTreeMap;

use emporia_types::{
    Account, AccountId, EmporiaError, GenesisAccount, Intent, IntentSide, LedgerDelta, LedgerKey,
    LedgerView, MarketConfig, Result,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::supply_conservation::SupplyConservation;

/// Single-writer ledger owned by a market's scheduler task.
#[derive(Debug, Clone)]
pub struct Ledger {
    house: AccountId,
    accounts: BTreeMap<AccountId, Account>,
    supply: SupplyConservation,
}

impl Ledger {
    /// Create a ledger containing only the house account.
    #[must_use]
    pub fn new(house: AccountId, house_key: [u8; 32]) -> Self {
        let mut accounts = BTreeMap::new();
        accounts.insert(house, Account::new(house, house_key));
        Self {
            house,
            accounts,
            supply: SupplyConservation::new(),
        }
    }

    /// Build a market's ledger from its genesis configuration.
    pub fn from_config(config: &MarketConfig) -> Result<Self> {
        let mut ledger = Self::new(config.house.id, config.house.holder_key()?);
        ledger.fund_genesis(&config.house)?;
        for genesis in &config.accounts {
            ledger.open_account(genesis.id, genesis.holder_key()?)?;
            ledger.fund_genesis(genesis)?;
        }
        tracing::debug!(
            market = %config.name,
            accounts = ledger.accounts.len(),
            "ledger built from genesis"
        );
        Ok(ledger)
    }

    fn fund_genesis(&mut self, genesis: &GenesisAccount) -> Result<()> {
        for (asset, amount) in &genesis.balances {
            if !amount.is_zero() {
                self.deposit(genesis.id, LedgerKey::Balance(asset.clone()), *amount)?;
            }
        }
        for (item, amount) in &genesis.holdings {
            if !amount.is_zero() {
                self.deposit(genesis.id, LedgerKey::Holding(item.clone()), *amount)?;
            }
        }
        Ok(())
    }

    /// The market's house account.
    #[must_use]
    pub fn house(&self) -> AccountId {
        self.house
    }

    #[must_use]
    pub fn account(&self, id: &AccountId) -> Option<&Account> {
        self.accounts.get(id)
    }

    /// Holder verifying key of an account.
    #[must_use]
    pub fn holder_key(&self, id: &AccountId) -> Option<[u8; 32]> {
        self.accounts.get(id).map(|a| a.holder_key)
    }

    /// Number of accounts including the house.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    // -----------------------------------------------------------------
    // Administrative funding
    // -----------------------------------------------------------------

    /// Open an empty account.
    ///
    /// # Errors
    /// [`EmporiaError::AccountExists`] if the ID is taken.
    pub fn open_account(&mut self, id: AccountId, holder_key: [u8; 32]) -> Result<()> {
        if self.accounts.contains_key(&id) {
            return Err(EmporiaError::AccountExists(id));
        }
        self.accounts.insert(id, Account::new(id, holder_key));
        tracing::debug!(account = %id, "account opened");
        Ok(())
    }

    /// Credit an account from outside the market.
    pub fn deposit(&mut self, id: AccountId, key: LedgerKey, amount: Decimal) -> Result<LedgerDelta> {
        check_positive(amount, "deposit amount")?;
        let account = self
            .accounts
            .get_mut(&id)
            .ok_or(EmporiaError::UnknownAccount(id))?;
        let current = read(account, &key);
        let after = current
            .checked_add(amount)
            .ok_or_else(|| EmporiaError::InvalidAmount {
                reason: format!("deposit overflows {key:?} of {id}"),
            })?;
        write(account, &key, after);
        self.supply.record_deposit(&key, amount);
        tracing::debug!(account = %id, key = ?key, %amount, "deposit");
        Ok(LedgerDelta {
            account: id,
            key,
            change: amount,
            after,
        })
    }

    /// Debit an account to outside the market.
    pub fn withdraw(
        &mut self,
        id: AccountId,
        key: LedgerKey,
        amount: Decimal,
    ) -> Result<LedgerDelta> {
        check_positive(amount, "withdraw amount")?;
        let account = self
            .accounts
            .get_mut(&id)
            .ok_or(EmporiaError::UnknownAccount(id))?;
        let current = read(account, &key);
        if current < amount {
            return Err(insufficient(id, &key, amount, current));
        }
        let after = current - amount;
        write(account, &key, after);
        self.supply.record_withdrawal(&key, amount);
        tracing::debug!(account = %id, key = ?key, %amount, "withdraw");
        Ok(LedgerDelta {
            account: id,
            key,
            change: -amount,
            after,
        })
    }

    // -----------------------------------------------------------------
    // Matching
    // -----------------------------------------------------------------

    /// Apply one intent against the house account.
    ///
    /// Every debit is checked against current values before any write.
    /// Returns the deltas in application order: payment out, payment in,
    /// item out, item in.
    ///
    /// # Errors
    /// - `InsufficientFunds` / `InsufficientHoldings` when either side can't cover it
    /// - `UnknownAccount` when the intent's account doesn't exist
    /// - `InvalidAmount` for non-positive quantity or price
    /// - `Internal` when the house account is missing, the intent targets the
    ///   house itself, or a credit would overflow
    pub fn apply_intent(&mut self, intent: &Intent) -> Result<Vec<LedgerDelta>> {
        check_positive(intent.quantity, "quantity")?;
        check_positive(intent.price, "price")?;
        if intent.account == self.house {
            return Err(EmporiaError::Internal(format!(
                "intent targets the house account {}",
                self.house
            )));
        }
        let notional = intent.notional().ok_or_else(|| {
            EmporiaError::Internal(format!("notional overflow for {intent}"))
        })?;
        let account = self
            .accounts
            .get(&intent.account)
            .ok_or(EmporiaError::UnknownAccount(intent.account))?;
        let house = self
            .accounts
            .get(&self.house)
            .ok_or_else(|| EmporiaError::Internal(format!("house account {} missing", self.house)))?;

        let (payer, payee, giver, taker) = match intent.side {
            IntentSide::Buy => (account, house, house, account),
            IntentSide::Sell => (house, account, account, house),
        };
        let asset_key = LedgerKey::Balance(intent.asset.clone());
        let item_key = LedgerKey::Holding(intent.item.clone());

        // Plan all four writes before touching anything.
        let plan = [
            debit(payer, &asset_key, notional)?,
            credit(payee, &asset_key, notional)?,
            debit(giver, &item_key, intent.quantity)?,
            credit(taker, &item_key, intent.quantity)?,
        ];

        let mut deltas = Vec::with_capacity(plan.len());
        for delta in plan {
            let target = self.accounts.get_mut(&delta.account).ok_or_else(|| {
                EmporiaError::Internal(format!("account {} vanished mid-apply", delta.account))
            })?;
            write(target, &delta.key, delta.after);
            deltas.push(delta);
        }
        Ok(deltas)
    }

    // -----------------------------------------------------------------
    // Invariants
    // -----------------------------------------------------------------

    /// Total of one key across every account.
    #[must_use]
    pub fn total(&self, key: &LedgerKey) -> Decimal {
        self.accounts.values().map(|a| read(a, key)).sum()
    }

    /// Check supply conservation for every key ever funded.
    ///
    /// # Errors
    /// [`EmporiaError::SupplyInvariantViolation`] on the first mismatch.
    pub fn verify_supply(&self) -> Result<()> {
        for key in self.supply.tracked_keys() {
            self.supply.verify(&key, self.total(&key))?;
        }
        // A key nobody funded must not hold value anywhere.
        for account in self.accounts.values() {
            let stray = account
                .balances
                .iter()
                .map(|(k, v)| (LedgerKey::Balance(k.clone()), *v))
                .chain(
                    account
                        .holdings
                        .iter()
                        .map(|(k, v)| (LedgerKey::Holding(k.clone()), *v)),
                )
                .find(|(k, v)| !v.is_zero() && self.supply.total_deposits(k).is_zero());
            if let Some((key, value)) = stray {
                return Err(EmporiaError::SupplyInvariantViolation {
                    reason: format!("{key:?}: {value} in {} was never deposited", account.id),
                });
            }
        }
        Ok(())
    }

    /// Frozen copy of every account, used as the execution-time view.
    #[must_use]
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            house: self.house,
            accounts: self.accounts.clone(),
        }
    }
}

impl LedgerView for Ledger {
    fn get_balance(&self, account: &AccountId, asset: &str) -> Option<Decimal> {
        self.accounts.get(account).map(|a| a.balance(asset))
    }

    fn get_holdings(&self, account: &AccountId, item: &str) -> Option<Decimal> {
        self.accounts.get(account).map(|a| a.holding(item))
    }
}

/// Point-in-time, read-only copy of a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub house: AccountId,
    pub accounts: BTreeMap<AccountId, Account>,
}

impl LedgerView for LedgerSnapshot {
    fn get_balance(&self, account: &AccountId, asset: &str) -> Option<Decimal> {
        self.accounts.get(account).map(|a| a.balance(asset))
    }

    fn get_holdings(&self, account: &AccountId, item: &str) -> Option<Decimal> {
        self.accounts.get(account).map(|a| a.holding(item))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read(account: &Account, key: &LedgerKey) -> Decimal {
    match key {
        LedgerKey::Balance(asset) => account.balance(asset),
        LedgerKey::Holding(item) => account.holding(item),
    }
}

fn write(account: &mut Account, key: &LedgerKey, value: Decimal) {
    match key {
        LedgerKey::Balance(asset) => {
            account.balances.insert(asset.clone(), value);
        }
        LedgerKey::Holding(item) => {
            account.holdings.insert(item.clone(), value);
        }
    }
}

fn check_positive(amount: Decimal, what: &str) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(EmporiaError::InvalidAmount {
            reason: format!("{what} must be positive, got {amount}"),
        });
    }
    Ok(())
}

fn insufficient(id: AccountId, key: &LedgerKey, needed: Decimal, available: Decimal) -> EmporiaError {
    match key {
        LedgerKey::Balance(asset) => EmporiaError::InsufficientFunds {
            account: id,
            asset: asset.clone(),
            needed,
            available,
        },
        LedgerKey::Holding(item) => EmporiaError::InsufficientHoldings {
            account: id,
            item: item.clone(),
            needed,
            available,
        },
    }
}

fn debit(account: &Account, key: &LedgerKey, amount: Decimal) -> Result<LedgerDelta> {
    let current = read(account, key);
    if current < amount {
        return Err(insufficient(account.id, key, amount, current));
    }
    Ok(LedgerDelta {
        account: account.id,
        key: key.clone(),
        change: -amount,
        after: current - amount,
    })
}

fn credit(account: &Account, key: &LedgerKey, amount: Decimal) -> Result<LedgerDelta> {
    let after = read(account, key).checked_add(amount).ok_or_else(|| {
        EmporiaError::Internal(format!("credit overflows {key:?} of {}", account.id))
    })?;
    Ok(LedgerDelta {
        account: account.id,
        key: key.clone(),
        change: amount,
        after,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn house() -> AccountId {
        AccountId::from_bytes([0; 16])
    }

    fn setup() -> (Ledger, AccountId) {
        let mut ledger = Ledger::new(house(), [0; 32]);
        let a = AccountId::from_bytes([1; 16]);
        ledger.open_account(a, [1; 32]).unwrap();
        ledger
            .deposit(house(), LedgerKey::Balance("USD".into()), Decimal::new(10_000, 0))
            .unwrap();
        ledger
            .deposit(house(), LedgerKey::Holding("X".into()), Decimal::new(1_000, 0))
            .unwrap();
        ledger
            .deposit(a, LedgerKey::Holding("X".into()), Decimal::new(100, 0))
            .unwrap();
        ledger
            .deposit(a, LedgerKey::Balance("USD".into()), Decimal::new(500, 0))
            .unwrap();
        (ledger, a)
    }

    fn intent(account: AccountId, side: IntentSide, qty: i64, price: i64) -> Intent {
        Intent {
            account,
            side,
            item: "X".into(),
            asset: "USD".into(),
            quantity: Decimal::new(qty, 0),
            price: Decimal::new(price, 0),
        }
    }

    #[test]
    fn sell_moves_item_to_house_and_cash_to_account() {
        let (mut ledger, a) = setup();
        let deltas = ledger.apply_intent(&intent(a, IntentSide::Sell, 80, 2)).unwrap();
        assert_eq!(deltas.len(), 4);
        assert_eq!(ledger.get_holdings(&a, "X"), Some(Decimal::new(20, 0)));
        assert_eq!(ledger.get_balance(&a, "USD"), Some(Decimal::new(660, 0)));
        assert_eq!(ledger.get_holdings(&house(), "X"), Some(Decimal::new(1080, 0)));
        ledger.verify_supply().unwrap();
    }

    #[test]
    fn buy_moves_cash_to_house_and_item_to_account() {
        let (mut ledger, a) = setup();
        ledger.apply_intent(&intent(a, IntentSide::Buy, 10, 5)).unwrap();
        assert_eq!(ledger.get_balance(&a, "USD"), Some(Decimal::new(450, 0)));
        assert_eq!(ledger.get_holdings(&a, "X"), Some(Decimal::new(110, 0)));
        ledger.verify_supply().unwrap();
    }

    #[test]
    fn oversell_rejected_without_mutation() {
        let (mut ledger, a) = setup();
        let before = ledger.snapshot();
        let err = ledger.apply_intent(&intent(a, IntentSide::Sell, 150, 1)).unwrap_err();
        assert!(matches!(err, EmporiaError::InsufficientHoldings { .. }));
        assert_eq!(ledger.snapshot(), before);
    }

    #[test]
    fn overbuy_rejected_without_mutation() {
        let (mut ledger, a) = setup();
        let before = ledger.snapshot();
        let err = ledger.apply_intent(&intent(a, IntentSide::Buy, 10, 100)).unwrap_err();
        assert!(matches!(err, EmporiaError::InsufficientFunds { .. }));
        assert_eq!(ledger.snapshot(), before);
    }

    #[test]
    fn house_shortfall_rejects_intent() {
        let (mut ledger, a) = setup();
        // House holds only 1000 X.
        let err = ledger
            .apply_intent(&Intent {
                price: Decimal::new(1, 2),
                ..intent(a, IntentSide::Buy, 2000, 0)
            })
            .unwrap_err();
        assert!(matches!(err, EmporiaError::InsufficientHoldings { account, .. } if account == house()));
    }

    #[test]
    fn unknown_account_rejected() {
        let (mut ledger, _) = setup();
        let err = ledger
            .apply_intent(&intent(AccountId::from_bytes([9; 16]), IntentSide::Sell, 1, 1))
            .unwrap_err();
        assert!(matches!(err, EmporiaError::UnknownAccount(_)));
    }

    #[test]
    fn non_positive_quantity_rejected() {
        let (mut ledger, a) = setup();
        let err = ledger.apply_intent(&intent(a, IntentSide::Sell, 0, 1)).unwrap_err();
        assert!(matches!(err, EmporiaError::InvalidAmount { .. }));
    }

    #[test]
    fn house_cannot_trade_with_itself() {
        let (mut ledger, _) = setup();
        let err = ledger.apply_intent(&intent(house(), IntentSide::Sell, 1, 1)).unwrap_err();
        assert!(matches!(err, EmporiaError::Internal(_)));
    }

    #[test]
    fn withdraw_checks_available() {
        let (mut ledger, a) = setup();
        let err = ledger
            .withdraw(a, LedgerKey::Balance("USD".into()), Decimal::new(501, 0))
            .unwrap_err();
        assert!(matches!(err, EmporiaError::InsufficientFunds { .. }));
        let delta = ledger
            .withdraw(a, LedgerKey::Balance("USD".into()), Decimal::new(500, 0))
            .unwrap();
        assert_eq!(delta.after, Decimal::ZERO);
        ledger.verify_supply().unwrap();
    }

    #[test]
    fn duplicate_account_rejected() {
        let (mut ledger, a) = setup();
        assert!(matches!(
            ledger.open_account(a, [0; 32]),
            Err(EmporiaError::AccountExists(_))
        ));
    }

    #[test]
    fn tampering_detected_by_supply_check() {
        let (mut ledger, a) = setup();
        if let Some(acct) = ledger.accounts.get_mut(&a) {
            acct.holdings.insert("X".into(), Decimal::new(101, 0));
        }
        assert!(matches!(
            ledger.verify_supply(),
            Err(EmporiaError::SupplyInvariantViolation { .. })
        ));
    }

    #[test]
    fn stray_key_detected_by_supply_check() {
        let (mut ledger, a) = setup();
        if let Some(acct) = ledger.accounts.get_mut(&a) {
            acct.holdings.insert("GHOST".into(), Decimal::ONE);
        }
        assert!(ledger.verify_supply().is_err());
    }

    #[test]
    fn from_config_funds_genesis() {
        let mut config = MarketConfig::named("M");
        config.house.balances.insert("USD".into(), Decimal::new(50, 0));
        let a = AccountId::from_bytes([3; 16]);
        config.accounts.push(GenesisAccount {
            id: a,
            holder_key_hex: "11".repeat(32),
            balances: BTreeMap::new(),
            holdings: BTreeMap::from([("X".into(), Decimal::new(100, 0))]),
        });
        let ledger = Ledger::from_config(&config).unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.holder_key(&a), Some([0x11; 32]));
        assert_eq!(ledger.get_holdings(&a, "X"), Some(Decimal::new(100, 0)));
        assert_eq!(ledger.get_balance(&ledger.house(), "USD"), Some(Decimal::new(50, 0)));
        ledger.verify_supply().unwrap();
    }
}

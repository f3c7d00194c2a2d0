//! Shared setup for the round integration tests.
//!
//! Every test runs under `start_paused`, so the schedulers' clocks only move
//! when all tasks are idle and sleeps return instantly.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::time::Duration;

use ed25519_dalek::SigningKey;
use emporia_round::{MarketRegistry, MarketSnapshot};
use emporia_types::program::test_helpers::{holder_keypair, submission};
use emporia_types::{
    AccountId, EmporiaConfig, EpochId, GenesisAccount, MarketConfig, MarketName,
    ProgramSubmission, RoundPhase, RoundTiming, TraderId,
};
use rust_decimal::Decimal;

pub const MS: Duration = Duration::from_millis(1);

pub fn dec(n: i64) -> Decimal {
    Decimal::new(n, 0)
}

pub fn timing() -> RoundTiming {
    RoundTiming {
        idle: 20 * MS,
        entering: 100 * MS,
        offering: 100 * MS,
        matching: 10 * MS,
        leaving: 100 * MS,
        retention: 150 * MS,
        tick: 5 * MS,
        enter_stagger: MS,
    }
}

/// Account "A": 100 X, no cash. The house holds 1,000,000 USD and 1,000 X.
pub struct Market {
    pub name: MarketName,
    pub key: SigningKey,
    pub account: AccountId,
}

impl Market {
    pub fn new() -> Self {
        let (key, _) = holder_keypair();
        Self::with_key(key)
    }

    pub fn with_key(key: SigningKey) -> Self {
        Self {
            name: MarketName::new("0"),
            key,
            account: AccountId::from_bytes([0xA; 16]),
        }
    }

    pub fn config(&self) -> EmporiaConfig {
        let mut market = MarketConfig::named(self.name.as_str());
        market.house.balances.insert("USD".into(), dec(1_000_000));
        market.house.holdings.insert("X".into(), dec(1_000));
        market.accounts.push(GenesisAccount {
            id: self.account,
            holder_key_hex: hex::encode(self.key.verifying_key().to_bytes()),
            balances: BTreeMap::new(),
            holdings: BTreeMap::from([("X".to_owned(), dec(100))]),
        });
        EmporiaConfig {
            markets: vec![market],
            round: timing(),
            ..EmporiaConfig::default()
        }
    }

    pub fn start(&self) -> MarketRegistry {
        MarketRegistry::start(&self.config()).expect("valid config")
    }

    /// A delegated program acting for account A.
    pub fn program(&self, trader: TraderId, code: &str) -> ProgramSubmission {
        submission(code, &self.key, self.account, trader, &self.name)
    }

    pub fn sell(&self, trader: TraderId, qty: i64) -> ProgramSubmission {
        self.program(trader, &format!("0 acct 'X 'USD {qty} 1 sell"))
    }

    pub fn buy(&self, trader: TraderId, qty: i64) -> ProgramSubmission {
        self.program(trader, &format!("0 acct 'X 'USD {qty} 1 buy"))
    }
}

pub fn trader(n: u8) -> TraderId {
    TraderId::from_bytes([n; 16])
}

/// Poll the market once per tick until it reaches `phase`.
pub async fn wait_for(
    registry: &MarketRegistry,
    market: &MarketName,
    phase: RoundPhase,
) -> MarketSnapshot {
    wait_until(registry, market, |s| s.phase == phase).await
}

/// Poll until `epoch` is in `phase`.
pub async fn wait_for_round(
    registry: &MarketRegistry,
    market: &MarketName,
    epoch: EpochId,
    phase: RoundPhase,
) -> MarketSnapshot {
    wait_until(registry, market, |s| s.epoch == epoch && s.phase == phase).await
}

async fn wait_until(
    registry: &MarketRegistry,
    market: &MarketName,
    done: impl Fn(&MarketSnapshot) -> bool,
) -> MarketSnapshot {
    for _ in 0..100_000 {
        let snap = registry.snapshot(market).await.expect("market is running");
        if done(&snap) {
            return snap;
        }
        tokio::time::sleep(timing().tick).await;
    }
    panic!("market {market} never reached the expected state");
}

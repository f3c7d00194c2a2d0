//! The market registry.
//!
//! Built once from an [`EmporiaConfig`] and handed to whoever serves
//! requests. Each call is routed by market name to that market's task and
//! answered there; the registry itself holds no round state.

use std::collections::BTreeMap;
use std::sync::Arc;

use emporia_types::{
    AccountId, EmporiaConfig, EmporiaError, EnterReceipt, LedgerDelta, LedgerKey, MarketName,
    OfferReceipt, ProgramSubmission, Result, RoundReport, TraderId,
};
use emporia_vm::OutputFilter;
use rust_decimal::Decimal;
use tokio::sync::{oneshot, watch};
use tokio::time::Instant;

use crate::redaction::Redactor;
use crate::scheduler::{Command, MarketHandle, Reply, spawn_market};
use crate::state_machine::{MarketSnapshot, RoundStateMachine};

/// All running markets, keyed by name.
pub struct MarketRegistry {
    markets: BTreeMap<MarketName, MarketHandle>,
    shutdown: watch::Sender<bool>,
}

impl MarketRegistry {
    /// Validate `config`, build every market and start its scheduler.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(config: &EmporiaConfig) -> Result<Self> {
        config.validate()?;
        let filter: Arc<dyn OutputFilter> = Arc::new(Redactor::new(&config.redaction));
        let (shutdown, signal) = watch::channel(false);
        let now = Instant::now();

        let mut markets = BTreeMap::new();
        for market in &config.markets {
            let machine = RoundStateMachine::new(market, config, Arc::clone(&filter), now)?;
            let handle = spawn_market(
                machine,
                config.round.tick,
                config.command_queue_depth,
                signal.clone(),
            );
            markets.insert(market.name.clone(), handle);
        }
        tracing::info!(
            markets = markets.len(),
            cycle = ?config.round.cycle(),
            "market registry started"
        );
        Ok(Self { markets, shutdown })
    }

    /// Names of the running markets, in order.
    pub fn markets(&self) -> impl Iterator<Item = &MarketName> {
        self.markets.keys()
    }

    pub async fn enter(
        &self,
        market: &MarketName,
        trader: TraderId,
        authority: Vec<AccountId>,
    ) -> Result<EnterReceipt> {
        self.request(market, |reply| Command::Enter {
            trader,
            authority,
            reply,
        })
        .await
    }

    pub async fn offer(
        &self,
        market: &MarketName,
        trader: TraderId,
        programs: Vec<ProgramSubmission>,
    ) -> Result<OfferReceipt> {
        self.request(market, |reply| Command::Offer {
            trader,
            programs,
            reply,
        })
        .await
    }

    pub async fn leave(&self, market: &MarketName, trader: TraderId) -> Result<Arc<RoundReport>> {
        self.request(market, |reply| Command::Leave { trader, reply })
            .await
    }

    pub async fn snapshot(&self, market: &MarketName) -> Result<MarketSnapshot> {
        self.request(market, |reply| Command::Snapshot { reply })
            .await
    }

    pub async fn open_account(
        &self,
        market: &MarketName,
        account: AccountId,
        holder_key: [u8; 32],
    ) -> Result<()> {
        self.request(market, |reply| Command::OpenAccount {
            account,
            holder_key,
            reply,
        })
        .await
    }

    pub async fn deposit(
        &self,
        market: &MarketName,
        account: AccountId,
        key: LedgerKey,
        amount: Decimal,
    ) -> Result<LedgerDelta> {
        self.request(market, |reply| Command::Deposit {
            account,
            key,
            amount,
            reply,
        })
        .await
    }

    pub async fn withdraw(
        &self,
        market: &MarketName,
        account: AccountId,
        key: LedgerKey,
        amount: Decimal,
    ) -> Result<LedgerDelta> {
        self.request(market, |reply| Command::Withdraw {
            account,
            key,
            amount,
            reply,
        })
        .await
    }

    pub async fn get_balance(
        &self,
        market: &MarketName,
        account: AccountId,
        asset: &str,
    ) -> Result<Decimal> {
        let key = LedgerKey::Balance(asset.to_owned());
        self.request(market, |reply| Command::Read {
            account,
            key,
            reply,
        })
        .await
    }

    pub async fn get_holdings(
        &self,
        market: &MarketName,
        account: AccountId,
        item: &str,
    ) -> Result<Decimal> {
        let key = LedgerKey::Holding(item.to_owned());
        self.request(market, |reply| Command::Read {
            account,
            key,
            reply,
        })
        .await
    }

    /// Signal every market task to stop and wait for all of them.
    pub async fn shutdown(self) {
        // Receivers may already be gone if a task ended on its own.
        let _ = self.shutdown.send(true);
        for (market, handle) in self.markets {
            if let Err(err) = handle.task.await {
                tracing::error!(%market, error = %err, "market task ended abnormally");
            }
        }
        tracing::info!("market registry stopped");
    }

    async fn request<T>(
        &self,
        market: &MarketName,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T> {
        let handle = self
            .markets
            .get(market)
            .ok_or_else(|| EmporiaError::UnknownMarket(market.clone()))?;
        let (reply, answer) = oneshot::channel();
        handle
            .commands
            .send(command(reply))
            .await
            .map_err(|_| EmporiaError::MarketUnavailable(market.clone()))?;
        answer
            .await
            .map_err(|_| EmporiaError::MarketUnavailable(market.clone()))?
    }
}

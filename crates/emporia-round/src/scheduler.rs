//! One tokio task per market.
//!
//! The task owns the market's [`RoundStateMachine`] and multiplexes three
//! inputs with `tokio::select!`, in priority order:
//!
//! 1. the shared `watch` shutdown signal
//! 2. the tick interval, which advances the round clock
//! 3. the bounded command queue carrying external calls
//!
//! Callers get their answer on a oneshot channel. A full queue makes the
//! caller wait (`send().await`); nothing is dropped. The task never awaits
//! while handling a tick or a command, so a market only stalls on its own
//! work.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use emporia_types::{
    AccountId, EnterReceipt, LedgerDelta, LedgerKey, MarketName, OfferReceipt, ProgramSubmission,
    Result, RoundReport, TraderId,
};
use rust_decimal::Decimal;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::state_machine::{MarketSnapshot, RoundStateMachine};

/// Reply channel for one command.
pub type Reply<T> = oneshot::Sender<Result<T>>;

/// A call routed to a market's task.
#[derive(Debug)]
pub enum Command {
    Enter {
        trader: TraderId,
        authority: Vec<AccountId>,
        reply: Reply<EnterReceipt>,
    },
    Offer {
        trader: TraderId,
        programs: Vec<ProgramSubmission>,
        reply: Reply<OfferReceipt>,
    },
    Leave {
        trader: TraderId,
        reply: Reply<Arc<RoundReport>>,
    },
    Snapshot {
        reply: Reply<MarketSnapshot>,
    },
    OpenAccount {
        account: AccountId,
        holder_key: [u8; 32],
        reply: Reply<()>,
    },
    Deposit {
        account: AccountId,
        key: LedgerKey,
        amount: Decimal,
        reply: Reply<LedgerDelta>,
    },
    Withdraw {
        account: AccountId,
        key: LedgerKey,
        amount: Decimal,
        reply: Reply<LedgerDelta>,
    },
    Read {
        account: AccountId,
        key: LedgerKey,
        reply: Reply<Decimal>,
    },
}

/// Sending side of a running market.
#[derive(Debug)]
pub struct MarketHandle {
    pub market: MarketName,
    pub commands: mpsc::Sender<Command>,
    pub task: JoinHandle<()>,
}

/// Spawn the task driving `machine`. Must be called inside a tokio runtime.
pub fn spawn_market(
    machine: RoundStateMachine,
    tick: Duration,
    queue_depth: usize,
    shutdown: watch::Receiver<bool>,
) -> MarketHandle {
    let market = machine.market().clone();
    let (commands, inbox) = mpsc::channel(queue_depth);
    let task = tokio::spawn(run_market(machine, tick, inbox, shutdown));
    MarketHandle {
        market,
        commands,
        task,
    }
}

async fn run_market(
    mut machine: RoundStateMachine,
    tick: Duration,
    mut inbox: mpsc::Receiver<Command>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(market = %machine.market(), ?tick, "market scheduler started");

    loop {
        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                // A dropped sender counts as shutdown.
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }

            _ = ticker.tick() => {
                machine.tick(Instant::now(), Utc::now());
            }

            Some(command) = inbox.recv() => {
                dispatch(&mut machine, command);
            }
        }
    }

    tracing::info!(
        market = %machine.market(),
        epoch = machine.epoch().0,
        phase = %machine.phase(),
        "market scheduler stopped"
    );
}

/// Apply one command and answer it. A caller that gave up waiting is ignored.
fn dispatch(machine: &mut RoundStateMachine, command: Command) {
    let now = Instant::now();
    match command {
        Command::Enter {
            trader,
            authority,
            reply,
        } => {
            let _ = reply.send(machine.enter(trader, authority, now));
        }
        Command::Offer {
            trader,
            programs,
            reply,
        } => {
            let _ = reply.send(machine.offer(trader, programs, now, Utc::now()));
        }
        Command::Leave { trader, reply } => {
            let _ = reply.send(machine.leave(trader, now));
        }
        Command::Snapshot { reply } => {
            let _ = reply.send(Ok(machine.snapshot(now)));
        }
        Command::OpenAccount {
            account,
            holder_key,
            reply,
        } => {
            let _ = reply.send(machine.open_account(account, holder_key));
        }
        Command::Deposit {
            account,
            key,
            amount,
            reply,
        } => {
            let _ = reply.send(machine.deposit(account, key, amount));
        }
        Command::Withdraw {
            account,
            key,
            amount,
            reply,
        } => {
            let _ = reply.send(machine.withdraw(account, key, amount));
        }
        Command::Read {
            account,
            key,
            reply,
        } => {
            let _ = reply.send(machine.read(&account, &key));
        }
    }
}

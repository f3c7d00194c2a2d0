//! Per-market round state machine.
//!
//! ```text
//! IDLE ──▶ ENTERING ──▶ OFFERING ──▶ MATCHING ──▶ LEAVING ──▶ IDLE (epoch + 1)
//! ```
//!
//! The machine is synchronous and owns everything a market mutates: the
//! ledger, the offer queue, the participant set and the retained report.
//! Time is passed in by the caller, which keeps every transition testable
//! without a runtime. [`tick`](RoundStateMachine::tick) crosses at most one
//! phase boundary per call, so every phase is visible for at least one tick.
//!
//! Matching runs inside the tick that enters MATCHING. The ledger is locked
//! against funding calls until LEAVING opens.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use emporia_ingress::{
    AdmissionControl, AuthorizationValidator, BatchSealer, PendingBuffer, QueuedProgram,
    SealedRound,
};
use emporia_ledger::Ledger;
use emporia_matchcore::{MatchGuard, settle_round};
use emporia_types::{
    AccountId, EmporiaConfig, EmporiaError, EnterReceipt, EpochId, ExecutionResult, LedgerDelta,
    LedgerKey, LedgerView, MarketConfig, MarketName, OfferReceipt, Program,
    ProgramSubmission, Rejection, Result, RoundPhase, RoundReport, RoundStatus, RoundTiming,
    TraderId, VmLimits,
};
use emporia_vm::{Code, OutputFilter};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::time::Instant;

/// A trader registered for the current round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Accounts the trader declared it acts for.
    pub authority: BTreeSet<AccountId>,
    /// 0-based arrival order within the round.
    pub arrival: usize,
    /// Wait hint handed out at ENTER.
    pub wait: Duration,
}

/// Point-in-time view of a market for operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketSnapshot {
    pub market: MarketName,
    pub phase: RoundPhase,
    pub epoch: EpochId,
    pub participants: usize,
    /// Programs admitted to the current round.
    pub queued: usize,
    /// Programs rejected at admission in the current round.
    pub rejected: usize,
    /// Whether a LEAVE would currently return a report.
    pub report_available: bool,
}

/// One market's round lifecycle.
pub struct RoundStateMachine {
    market: MarketName,
    timing: RoundTiming,
    vm_limits: VmLimits,
    phase: RoundPhase,
    epoch: EpochId,
    /// When the current phase ends.
    deadline: Instant,
    participants: BTreeMap<TraderId, Participant>,
    /// Largest wait handed out this round; waits never decrease.
    last_wait: Duration,
    admission: AdmissionControl,
    pending: PendingBuffer,
    sealer: BatchSealer,
    ledger: Ledger,
    guard: MatchGuard,
    filter: Arc<dyn OutputFilter>,
    opened_at: DateTime<Utc>,
    report: Option<Arc<RoundReport>>,
    report_expires: Option<Instant>,
}

impl RoundStateMachine {
    /// Build a market in IDLE at epoch 1.
    pub fn new(
        market: &MarketConfig,
        config: &EmporiaConfig,
        filter: Arc<dyn OutputFilter>,
        now: Instant,
    ) -> Result<Self> {
        let ledger = Ledger::from_config(market)?;
        let epoch = EpochId(1);
        let mut admission = AdmissionControl::new(config.admission.clone());
        admission.advance_epoch(epoch);
        Ok(Self {
            market: market.name.clone(),
            timing: config.round.clone(),
            vm_limits: config.vm.clone(),
            phase: RoundPhase::Idle,
            epoch,
            deadline: now + config.round.idle,
            participants: BTreeMap::new(),
            last_wait: Duration::ZERO,
            admission,
            pending: PendingBuffer::with_capacity(config.admission.max_programs_per_round),
            sealer: BatchSealer::new(market.name.clone()),
            ledger,
            guard: MatchGuard::new(),
            filter,
            opened_at: Utc::now(),
            report: None,
            report_expires: None,
        })
    }

    #[must_use]
    pub fn market(&self) -> &MarketName {
        &self.market
    }

    #[must_use]
    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    #[must_use]
    pub fn epoch(&self) -> EpochId {
        self.epoch
    }

    #[must_use]
    pub fn participant(&self, trader: &TraderId) -> Option<&Participant> {
        self.participants.get(trader)
    }

    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    // -----------------------------------------------------------------
    // Clock
    // -----------------------------------------------------------------

    /// Advance the clock. Returns the phase entered, if any.
    pub fn tick(&mut self, now: Instant, wall: DateTime<Utc>) -> Option<RoundPhase> {
        if self.phase == RoundPhase::Idle
            && self.report_expires.is_some_and(|expires| now >= expires)
        {
            self.report = None;
            self.report_expires = None;
        }
        if now < self.deadline {
            return None;
        }

        let from = self.phase;
        let to = from.next();
        match to {
            RoundPhase::Entering => {
                self.opened_at = wall;
                self.participants.clear();
                self.last_wait = Duration::ZERO;
                self.admission.advance_epoch(self.epoch);
                self.pending.reset();
            }
            RoundPhase::Matching => self.run_matching(wall),
            RoundPhase::Leaving => {
                self.report_expires = Some(now + self.timing.retention);
            }
            RoundPhase::Idle => {
                self.participants.clear();
                self.pending.reset();
                self.epoch = self.epoch.next();
            }
            RoundPhase::Offering => {}
        }
        self.phase = to;
        self.deadline = now + self.timing.phase_duration(to);

        tracing::info!(
            market = %self.market,
            epoch = self.epoch.0,
            from = %from,
            to = %to,
            participants = self.participants.len(),
            "phase transition"
        );
        Some(to)
    }

    fn run_matching(&mut self, wall: DateTime<Utc>) {
        let report = match self.seal() {
            Ok(round) => {
                let outcome = settle_round(
                    &round,
                    &mut self.ledger,
                    &mut self.guard,
                    &self.vm_limits,
                    self.filter.as_ref(),
                );
                let report = RoundReport {
                    market: self.market.clone(),
                    epoch: self.epoch,
                    status: outcome.status,
                    results: outcome.results,
                    input_hash: outcome.input_hash,
                    results_root: outcome.results_root,
                    fault: outcome.fault,
                    opened_at: self.opened_at,
                    settled_at: wall,
                };
                tracing::info!(
                    market = %self.market,
                    epoch = self.epoch.0,
                    status = %report.status,
                    programs = report.results.len(),
                    succeeded = report.succeeded(),
                    input_hash = %hex::encode(report.input_hash),
                    results_root = %hex::encode(report.results_root),
                    "round settled"
                );
                report
            }
            Err(err) => {
                tracing::error!(
                    market = %self.market,
                    epoch = self.epoch.0,
                    error = %err,
                    "could not seal round"
                );
                RoundReport {
                    market: self.market.clone(),
                    epoch: self.epoch,
                    status: RoundStatus::Failed,
                    results: Vec::new(),
                    input_hash: [0; 32],
                    results_root: [0; 32],
                    fault: Some(err.to_string()),
                    opened_at: self.opened_at,
                    settled_at: wall,
                }
            }
        };
        self.report = Some(Arc::new(report));
        self.report_expires = None;
    }

    fn seal(&mut self) -> Result<SealedRound> {
        self.pending.seal()?;
        let (programs, rejected) = self.pending.drain()?;
        Ok(self.sealer.seal(self.epoch, programs, rejected))
    }

    // -----------------------------------------------------------------
    // ENTER / OFFER / LEAVE
    // -----------------------------------------------------------------

    /// Register `trader` for the current round.
    ///
    /// Entering twice returns the first receipt unchanged.
    pub fn enter(
        &mut self,
        trader: TraderId,
        authority: Vec<AccountId>,
        now: Instant,
    ) -> Result<EnterReceipt> {
        self.expect_phase("ENTER", RoundPhase::Entering)?;
        if let Some(existing) = self.participants.get(&trader) {
            return Ok(EnterReceipt {
                epoch: self.epoch,
                arrival: existing.arrival,
                wait: existing.wait,
            });
        }
        self.admission.check_participants(self.participants.len())?;

        let arrival = self.participants.len();
        let stagger = self
            .timing
            .enter_stagger
            .saturating_mul(u32::try_from(arrival).unwrap_or(u32::MAX));
        let wait = (self.deadline.saturating_duration_since(now) + stagger).max(self.last_wait);
        self.last_wait = wait;
        self.participants.insert(
            trader,
            Participant {
                authority: authority.into_iter().collect(),
                arrival,
                wait,
            },
        );
        tracing::debug!(market = %self.market, %trader, arrival, ?wait, "participant entered");
        Ok(EnterReceipt {
            epoch: self.epoch,
            arrival,
            wait,
        })
    }

    /// Submit a batch of programs.
    ///
    /// The call fails as a whole only for phase, participation, batch
    /// size and the round's submission budget. Everything else rejects individual programs, which still get a
    /// result in the round report.
    pub fn offer(
        &mut self,
        trader: TraderId,
        submissions: Vec<ProgramSubmission>,
        now: Instant,
        wall: DateTime<Utc>,
    ) -> Result<OfferReceipt> {
        self.expect_phase("OFFER", RoundPhase::Offering)?;
        let authority = self
            .participants
            .get(&trader)
            .map(|p| p.authority.clone())
            .ok_or(EmporiaError::NotParticipant(trader))?;
        self.admission.open_batch(submissions.len())?;

        let mut admitted = Vec::new();
        let mut rejected = Vec::new();
        for submission in submissions {
            let sequence = self.pending.next_sequence()?;
            let checked = self.admission.check_program(&submission);
            let program =
                Program::from_submission(&self.market, self.epoch, sequence, trader, submission);
            match checked.and_then(|()| self.admit(&program, &authority, wall)) {
                Ok(code) => {
                    admitted.push(program.id);
                    self.pending.push(QueuedProgram { program, code })?;
                }
                Err(err) => {
                    tracing::debug!(
                        market = %self.market,
                        program = %program.id,
                        sequence,
                        kind = %err.kind(),
                        error = %err,
                        "program rejected at admission"
                    );
                    rejected.push(Rejection {
                        program_id: program.id,
                        sequence,
                        kind: err.kind(),
                        detail: err.to_string(),
                    });
                    self.pending.push_rejected(ExecutionResult::rejected_at_admission(
                        program.id, sequence, trader, &err,
                    ))?;
                }
            }
        }

        tracing::debug!(
            market = %self.market,
            %trader,
            admitted = admitted.len(),
            rejected = rejected.len(),
            "offer processed"
        );
        Ok(OfferReceipt {
            epoch: self.epoch,
            wait: self.deadline.saturating_duration_since(now) + self.timing.matching,
            admitted,
            rejected,
        })
    }

    /// Compile, authorize and count one program. Quota is only consumed by
    /// programs that pass every other check.
    fn admit(
        &mut self,
        program: &Program,
        authority: &BTreeSet<AccountId>,
        wall: DateTime<Utc>,
    ) -> Result<Code> {
        let code = emporia_vm::compile(&program.code)?;
        AuthorizationValidator::new(&self.market, &self.ledger).authorize(
            program,
            authority,
            wall,
        )?;
        self.admission.reserve(program.submitter)?;
        Ok(code)
    }

    /// Collect the last round's report.
    pub fn leave(&self, trader: TraderId, now: Instant) -> Result<Arc<RoundReport>> {
        let report = self
            .retained_report(now)?
            .ok_or_else(|| EmporiaError::NoRetainedReport(self.market.clone()))?;
        tracing::debug!(market = %self.market, %trader, epoch = report.epoch.0, "report collected");
        Ok(report)
    }

    fn retained_report(&self, now: Instant) -> Result<Option<Arc<RoundReport>>> {
        match self.phase {
            RoundPhase::Leaving => Ok(self.report.clone()),
            RoundPhase::Idle => Ok(self
                .report
                .clone()
                .filter(|_| self.report_expires.is_some_and(|expires| now < expires))),
            actual => Err(EmporiaError::WrongPhase {
                call: "LEAVE",
                actual,
            }),
        }
    }

    // -----------------------------------------------------------------
    // Ledger administration
    // -----------------------------------------------------------------

    pub fn open_account(&mut self, id: AccountId, holder_key: [u8; 32]) -> Result<()> {
        self.ensure_unlocked()?;
        self.ledger.open_account(id, holder_key)
    }

    pub fn deposit(&mut self, id: AccountId, key: LedgerKey, amount: Decimal) -> Result<LedgerDelta> {
        self.ensure_unlocked()?;
        self.ledger.deposit(id, key, amount)
    }

    pub fn withdraw(&mut self, id: AccountId, key: LedgerKey, amount: Decimal) -> Result<LedgerDelta> {
        self.ensure_unlocked()?;
        self.ledger.withdraw(id, key, amount)
    }

    /// Current value of one ledger cell.
    pub fn read(&self, id: &AccountId, key: &LedgerKey) -> Result<Decimal> {
        let value = match key {
            LedgerKey::Balance(asset) => self.ledger.get_balance(id, asset),
            LedgerKey::Holding(item) => self.ledger.get_holdings(id, item),
        };
        value.ok_or(EmporiaError::UnknownAccount(*id))
    }

    #[must_use]
    pub fn snapshot(&self, now: Instant) -> MarketSnapshot {
        MarketSnapshot {
            market: self.market.clone(),
            phase: self.phase,
            epoch: self.epoch,
            participants: self.participants.len(),
            queued: self.pending.len(),
            rejected: self.pending.rejected_len(),
            report_available: matches!(self.retained_report(now), Ok(Some(_))),
        }
    }

    fn expect_phase(&self, call: &'static str, expected: RoundPhase) -> Result<()> {
        if self.phase != expected {
            return Err(EmporiaError::WrongPhase {
                call,
                actual: self.phase,
            });
        }
        Ok(())
    }

    fn ensure_unlocked(&self) -> Result<()> {
        if self.phase == RoundPhase::Matching {
            return Err(EmporiaError::LedgerLocked);
        }
        Ok(())
    }
}

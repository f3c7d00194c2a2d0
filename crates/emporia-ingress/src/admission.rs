//! Admission limits for ENTER and OFFER.
//!
//! Batch-level checks (participant cap, batch size, the round's submission
//! budget) fail the whole call. Per-program checks (code size, account
//! count, per-trader program cap) reject only the offending program.
//!
//! The round budget counts every submission, admitted or rejected, so a
//! participant cannot grow the report with programs that never pass.

use std::collections::HashMap;

use emporia_types::{
    AdmissionLimits, EmporiaError, EpochId, ProgramSubmission, Result, TraderId,
};

/// Per-round admission counters plus the configured limits.
pub struct AdmissionControl {
    limits: AdmissionLimits,
    /// Programs admitted per trader in the current round.
    per_trader: HashMap<TraderId, usize>,
    /// Programs admitted in the current round.
    admitted: usize,
    /// Programs submitted in the current round, rejected ones included.
    submitted: usize,
    current_epoch: EpochId,
}

impl AdmissionControl {
    #[must_use]
    pub fn new(limits: AdmissionLimits) -> Self {
        Self {
            limits,
            per_trader: HashMap::new(),
            admitted: 0,
            submitted: 0,
            current_epoch: EpochId(0),
        }
    }

    /// Start counting for a new round.
    pub fn advance_epoch(&mut self, epoch: EpochId) {
        self.current_epoch = epoch;
        self.per_trader.clear();
        self.admitted = 0;
        self.submitted = 0;
    }

    /// Whether one more participant may enter.
    pub fn check_participants(&self, current: usize) -> Result<()> {
        if current >= self.limits.max_participants {
            return Err(EmporiaError::ParticipantLimit {
                max: self.limits.max_participants,
            });
        }
        Ok(())
    }

    /// Accept an OFFER call of `len` programs and charge it to the round.
    ///
    /// # Errors
    /// - `BatchTooLarge` above the per-offer limit
    /// - `RoundFull` if the batch would overrun the round's budget
    pub fn open_batch(&mut self, len: usize) -> Result<()> {
        if len > self.limits.max_programs_per_offer {
            return Err(EmporiaError::BatchTooLarge {
                submitted: len,
                max: self.limits.max_programs_per_offer,
            });
        }
        if self.submitted.saturating_add(len) > self.limits.max_programs_per_round {
            return Err(EmporiaError::RoundFull {
                max: self.limits.max_programs_per_round,
            });
        }
        self.submitted += len;
        Ok(())
    }

    /// Static checks on one submission.
    pub fn check_program(&self, submission: &ProgramSubmission) -> Result<()> {
        if submission.code.len() > self.limits.max_code_bytes {
            return Err(EmporiaError::CodeTooLarge {
                bytes: submission.code.len(),
                max: self.limits.max_code_bytes,
            });
        }
        if submission.accounts.len() > self.limits.max_accounts_per_program {
            return Err(EmporiaError::TooManyAccounts {
                count: submission.accounts.len(),
                max: self.limits.max_accounts_per_program,
            });
        }
        Ok(())
    }

    /// Count one admitted program against the trader's cap.
    pub fn reserve(&mut self, trader: TraderId) -> Result<()> {
        let count = self.per_trader.entry(trader).or_insert(0);
        if *count >= self.limits.max_programs_per_trader {
            return Err(EmporiaError::TooManyPrograms {
                trader,
                max: self.limits.max_programs_per_trader,
            });
        }
        *count += 1;
        self.admitted += 1;
        Ok(())
    }

    #[must_use]
    pub fn current_epoch(&self) -> EpochId {
        self.current_epoch
    }

    /// Programs admitted so far this round.
    #[must_use]
    pub fn admitted(&self) -> usize {
        self.admitted
    }

    /// Programs submitted so far this round, rejected ones included.
    #[must_use]
    pub fn submitted(&self) -> usize {
        self.submitted
    }
}

//! Per-program execution results.
//!
//! Every submitted program, admitted or not, ends the round with exactly one
//! [`ExecutionResult`]. Results contain no timestamps, so two runs over the
//! same input serialize to the same bytes.

use serde::{Deserialize, Serialize};

use crate::{EmporiaError, ErrorKind, Intent, LedgerDelta, ProgramId, TraderId};

/// How a program ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProgramOutcome {
    /// Ran to completion and every intent applied.
    Success,
    /// Turned away at admission, or an intent failed the apply-time check.
    Rejected { kind: ErrorKind, detail: String },
    /// Aborted during execution (fuel, stack, runtime error). No intents applied.
    Faulted { kind: ErrorKind, detail: String },
}

impl ProgramOutcome {
    #[must_use]
    pub fn rejected(err: &EmporiaError) -> Self {
        Self::Rejected {
            kind: err.kind(),
            detail: err.to_string(),
        }
    }

    #[must_use]
    pub fn faulted(err: &EmporiaError) -> Self {
        Self::Faulted {
            kind: err.kind(),
            detail: err.to_string(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// The error kind, if the program did not succeed.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success => None,
            Self::Rejected { kind, .. } | Self::Faulted { kind, .. } => Some(*kind),
        }
    }
}

/// What happened to one emitted intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IntentOutcome {
    Applied,
    Rejected { kind: ErrorKind, detail: String },
    /// Never reached the ledger (program faulted or the round stopped).
    Skipped,
}

/// An emitted intent together with its apply outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentRecord {
    pub intent: Intent,
    pub outcome: IntentOutcome,
}

/// Result of one program in one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub program_id: ProgramId,
    pub sequence: u64,
    pub submitter: TraderId,
    pub outcome: ProgramOutcome,
    /// Emitted intents in emission order.
    pub intents: Vec<IntentRecord>,
    /// Ledger deltas applied on this program's behalf, in apply order.
    pub deltas: Vec<LedgerDelta>,
    /// Captured screen output.
    pub screen: String,
    /// Whether screen output was cut off at the buffer limit.
    pub screen_truncated: bool,
    /// Instructions executed.
    pub fuel_used: u64,
}

impl ExecutionResult {
    /// Result for a program turned away before it could run.
    #[must_use]
    pub fn rejected_at_admission(
        program_id: ProgramId,
        sequence: u64,
        submitter: TraderId,
        err: &EmporiaError,
    ) -> Self {
        Self {
            program_id,
            sequence,
            submitter,
            outcome: ProgramOutcome::rejected(err),
            intents: Vec::new(),
            deltas: Vec::new(),
            screen: String::new(),
            screen_truncated: false,
            fuel_used: 0,
        }
    }
}

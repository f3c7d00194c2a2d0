//! Round lifecycle types.
//!
//! Each round of a market cycles through five non-overlapping phases:
//! **IDLE → ENTERING → OFFERING → MATCHING → LEAVING → IDLE**
//!
//! During ENTERING, traders register as participants.
//! During OFFERING, participants submit batches of programs.
//! During MATCHING, programs execute and their intents are applied in
//! submission order.
//! During LEAVING, participants download the round report.

use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EpochId, ErrorKind, ExecutionResult, MarketName, ProgramId, constants};

/// The phases of a market's round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    /// Between rounds. The previous report may still be retained.
    Idle,
    /// Accepting ENTER calls.
    Entering,
    /// Accepting OFFER calls from participants.
    Offering,
    /// Executing programs and applying their intents.
    Matching,
    /// Round settled; accepting LEAVE calls.
    Leaving,
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Entering => write!(f, "ENTERING"),
            Self::Offering => write!(f, "OFFERING"),
            Self::Matching => write!(f, "MATCHING"),
            Self::Leaving => write!(f, "LEAVING"),
        }
    }
}

impl RoundPhase {
    /// Return the next phase in the cycle.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Idle => Self::Entering,
            Self::Entering => Self::Offering,
            Self::Offering => Self::Matching,
            Self::Matching => Self::Leaving,
            Self::Leaving => Self::Idle,
        }
    }
}

/// Overall settlement outcome of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    /// Every admitted program was processed.
    Complete,
    /// An internal fault stopped matching after some intents were applied.
    Partial,
    /// An internal fault stopped matching before anything was applied.
    Failed,
}

impl fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => write!(f, "complete"),
            Self::Partial => write!(f, "partial"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Configuration for round timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundTiming {
    /// Pause between rounds.
    pub idle: Duration,
    /// Duration of the ENTERING phase.
    pub entering: Duration,
    /// Duration of the OFFERING phase.
    pub offering: Duration,
    /// Minimum time spent in MATCHING after the engine ran.
    pub matching: Duration,
    /// Duration of the LEAVING phase.
    pub leaving: Duration,
    /// How long after LEAVING opens a report is still served.
    pub retention: Duration,
    /// Scheduler tick interval.
    pub tick: Duration,
    /// Stagger added per ENTER arrival to spread OFFER calls.
    pub enter_stagger: Duration,
}

impl Default for RoundTiming {
    fn default() -> Self {
        Self {
            idle: Duration::from_millis(constants::DEFAULT_IDLE_MS),
            entering: Duration::from_millis(constants::DEFAULT_ENTERING_MS),
            offering: Duration::from_millis(constants::DEFAULT_OFFERING_MS),
            matching: Duration::from_millis(constants::DEFAULT_MATCHING_MS),
            leaving: Duration::from_millis(constants::DEFAULT_LEAVING_MS),
            retention: Duration::from_millis(constants::DEFAULT_RETENTION_MS),
            tick: Duration::from_millis(constants::DEFAULT_TICK_MS),
            enter_stagger: Duration::from_millis(constants::DEFAULT_ENTER_STAGGER_MS),
        }
    }
}

impl RoundTiming {
    /// Configured duration of a phase.
    #[must_use]
    pub fn phase_duration(&self, phase: RoundPhase) -> Duration {
        match phase {
            RoundPhase::Idle => self.idle,
            RoundPhase::Entering => self.entering,
            RoundPhase::Offering => self.offering,
            RoundPhase::Matching => self.matching,
            RoundPhase::Leaving => self.leaving,
        }
    }

    /// Nominal duration of one full cycle.
    #[must_use]
    pub fn cycle(&self) -> Duration {
        self.idle + self.entering + self.offering + self.matching + self.leaving
    }
}

/// Reply to a successful ENTER.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnterReceipt {
    pub epoch: EpochId,
    /// Position among this round's participants, from zero.
    pub arrival: usize,
    /// How long to wait before calling OFFER.
    pub wait: Duration,
}

/// A program turned away at admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub program_id: ProgramId,
    pub sequence: u64,
    pub kind: ErrorKind,
    pub detail: String,
}

/// Reply to a successful OFFER.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferReceipt {
    pub epoch: EpochId,
    /// How long to wait before calling LEAVE.
    pub wait: Duration,
    /// Programs queued for matching, in submission order.
    pub admitted: Vec<ProgramId>,
    /// Programs rejected at admission. They still appear in the report.
    pub rejected: Vec<Rejection>,
}

/// Everything a round produced, returned by LEAVE.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundReport {
    pub market: MarketName,
    pub epoch: EpochId,
    pub status: RoundStatus,
    /// One result per submitted program, ordered by submission sequence.
    pub results: Vec<ExecutionResult>,
    /// Hash committing to the sealed program list.
    pub input_hash: [u8; 32],
    /// Hash over the serialized results.
    pub results_root: [u8; 32],
    /// Internal fault description when status is not `complete`.
    pub fault: Option<String>,
    pub opened_at: DateTime<Utc>,
    pub settled_at: DateTime<Utc>,
}

impl RoundReport {
    /// Number of programs whose outcome is success.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_success()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_phase_cycle() {
        assert_eq!(RoundPhase::Idle.next(), RoundPhase::Entering);
        assert_eq!(RoundPhase::Entering.next(), RoundPhase::Offering);
        assert_eq!(RoundPhase::Offering.next(), RoundPhase::Matching);
        assert_eq!(RoundPhase::Matching.next(), RoundPhase::Leaving);
        assert_eq!(RoundPhase::Leaving.next(), RoundPhase::Idle);
    }

    #[test]
    fn round_phase_display() {
        assert_eq!(format!("{}", RoundPhase::Entering), "ENTERING");
        assert_eq!(format!("{}", RoundPhase::Matching), "MATCHING");
    }

    #[test]
    fn round_status_serializes_lowercase() {
        let json = serde_json::to_string(&RoundStatus::Partial).unwrap();
        assert_eq!(json, "\"partial\"");
    }

    #[test]
    fn timing_default_cycle() {
        let t = RoundTiming::default();
        // 250 + 1000 + 2000 + 100 + 2000
        assert_eq!(t.cycle().as_millis(), 5350);
        assert_eq!(t.phase_duration(RoundPhase::Offering).as_millis(), 2000);
    }

    #[test]
    fn timing_partial_json_uses_defaults() {
        let t: RoundTiming =
            serde_json::from_str(r#"{"entering":{"secs":3,"nanos":0}}"#).unwrap();
        assert_eq!(t.entering, Duration::from_secs(3));
        assert_eq!(t.offering.as_millis(), 2000);
    }
}

//! Round sealer: produces the immutable [`SealedRound`] the engine consumes.
//!
//! Sealing sorts programs by submission sequence and commits to them with a
//! SHA-256 hash, so two nodes (or two replays) can confirm they matched the
//! same input.

use emporia_types::{EpochId, ExecutionResult, MarketName};
use sha2::{Digest, Sha256};

use crate::pending_buffer::QueuedProgram;

/// Everything submitted to one round, frozen at the end of Offering.
#[derive(Debug, Clone)]
pub struct SealedRound {
    pub market: MarketName,
    pub epoch: EpochId,
    /// Admitted programs in submission order.
    pub programs: Vec<QueuedProgram>,
    /// Programs rejected at admission, in submission order.
    pub rejected: Vec<ExecutionResult>,
    /// Commitment over `programs`.
    pub round_hash: [u8; 32],
}

/// Seals drained offer queues for one market.
pub struct BatchSealer {
    market: MarketName,
}

impl BatchSealer {
    #[must_use]
    pub fn new(market: MarketName) -> Self {
        Self { market }
    }

    /// Sort by sequence and hash.
    #[must_use]
    pub fn seal(
        &self,
        epoch: EpochId,
        mut programs: Vec<QueuedProgram>,
        mut rejected: Vec<ExecutionResult>,
    ) -> SealedRound {
        programs.sort_by_key(|q| q.program.sequence);
        rejected.sort_by_key(|r| r.sequence);
        let round_hash = Self::compute_round_hash(&self.market, epoch, &programs);
        tracing::debug!(
            market = %self.market,
            epoch = epoch.0,
            programs = programs.len(),
            rejected = rejected.len(),
            "round sealed"
        );
        SealedRound {
            market: self.market.clone(),
            epoch,
            programs,
            rejected,
            round_hash,
        }
    }

    /// SHA-256 over the ordered program list.
    ///
    /// Commits to the market, the epoch, the program count and, per program,
    /// its ID, sequence, submitter, claimed accounts and source code.
    fn compute_round_hash(market: &MarketName, epoch: EpochId, programs: &[QueuedProgram]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"emporia:round:v1:");
        hasher.update((market.0.len() as u64).to_le_bytes());
        hasher.update(market.0.as_bytes());
        hasher.update(epoch.0.to_le_bytes());
        hasher.update((programs.len() as u64).to_le_bytes());

        for queued in programs {
            let p = &queued.program;
            hasher.update(p.id.0.as_bytes());
            hasher.update(p.sequence.to_le_bytes());
            hasher.update(p.submitter.0.as_bytes());
            hasher.update((p.accounts.len() as u64).to_le_bytes());
            for account in &p.accounts {
                hasher.update(account.0.as_bytes());
            }
            hasher.update((p.code.len() as u64).to_le_bytes());
            hasher.update(p.code.as_bytes());
        }

        hasher.finalize().into()
    }

    /// Recompute and compare a sealed round's hash.
    #[must_use]
    pub fn verify_round_hash(round: &SealedRound) -> bool {
        Self::compute_round_hash(&round.market, round.epoch, &round.programs) == round.round_hash
    }
}

#[cfg(test)]
mod tests {
    use emporia_types::{Program, ProgramSubmission, TraderId};

    use super::*;

    fn queued(sequence: u64, code: &str) -> QueuedProgram {
        QueuedProgram {
            program: Program::from_submission(
                &MarketName::new("M"),
                EpochId(1),
                sequence,
                TraderId::from_bytes([1; 16]),
                ProgramSubmission {
                    code: code.into(),
                    accounts: vec![],
                    delegations: vec![],
                },
            ),
            code: emporia_vm::compile(code).unwrap(),
        }
    }

    fn sealer() -> BatchSealer {
        BatchSealer::new(MarketName::new("M"))
    }

    #[test]
    fn seal_empty_round() {
        let round = sealer().seal(EpochId(1), vec![], vec![]);
        assert!(round.programs.is_empty());
        assert_ne!(round.round_hash, [0u8; 32]);
    }

    #[test]
    fn seal_sorts_by_sequence() {
        let round = sealer().seal(
            EpochId(1),
            vec![queued(2, "1"), queued(0, "2"), queued(1, "3")],
            vec![],
        );
        let seqs: Vec<u64> = round.programs.iter().map(|q| q.program.sequence).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn hash_is_order_independent_of_arrival() {
        let a = sealer().seal(EpochId(1), vec![queued(0, "1"), queued(1, "2")], vec![]);
        let b = sealer().seal(EpochId(1), vec![queued(1, "2"), queued(0, "1")], vec![]);
        assert_eq!(a.round_hash, b.round_hash);
    }

    #[test]
    fn hash_commits_to_code_and_epoch() {
        let a = sealer().seal(EpochId(1), vec![queued(0, "1")], vec![]);
        let b = sealer().seal(EpochId(1), vec![queued(0, "2")], vec![]);
        let c = sealer().seal(EpochId(2), vec![queued(0, "1")], vec![]);
        assert_ne!(a.round_hash, b.round_hash);
        assert_ne!(a.round_hash, c.round_hash);
    }

    #[test]
    fn tampering_detected() {
        let mut round = sealer().seal(EpochId(1), vec![queued(0, "1")], vec![]);
        assert!(BatchSealer::verify_round_hash(&round));
        round.programs[0].program.code = "2".into();
        assert!(!BatchSealer::verify_round_hash(&round));
    }
}

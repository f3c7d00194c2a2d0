//! Match guard: every epoch is matched once, and every program in it once.
//!
//! Program IDs are derived from (market, epoch, sequence), so only the
//! epoch being matched needs its IDs remembered. Older epochs are refused
//! outright.

use std::collections::HashSet;

use emporia_types::{EmporiaError, EpochId, ProgramId, Result};

/// Tracks the epoch being matched and the programs it has applied.
#[derive(Debug, Default)]
pub struct MatchGuard {
    epoch: Option<EpochId>,
    matched: HashSet<ProgramId>,
}

impl MatchGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `epoch` for matching and forget the previous epoch's programs.
    ///
    /// # Errors
    /// [`EmporiaError::EpochAlreadyMatched`] unless `epoch` is newer than
    /// every epoch opened before.
    pub fn begin_epoch(&mut self, epoch: EpochId) -> Result<()> {
        if let Some(last) = self.epoch.filter(|last| epoch <= *last) {
            return Err(EmporiaError::EpochAlreadyMatched { epoch, last });
        }
        self.epoch = Some(epoch);
        self.matched.clear();
        Ok(())
    }

    /// Mark a program of the open epoch as matched.
    ///
    /// # Errors
    /// - `Internal` when no epoch is open
    /// - [`EmporiaError::DuplicateProgram`] if it was already matched
    pub fn mark_matched(&mut self, id: ProgramId) -> Result<()> {
        if self.epoch.is_none() {
            return Err(EmporiaError::Internal(
                "program matched before any epoch was opened".into(),
            ));
        }
        if !self.matched.insert(id) {
            return Err(EmporiaError::DuplicateProgram(id));
        }
        Ok(())
    }

    /// The epoch currently open for matching.
    #[must_use]
    pub fn epoch(&self) -> Option<EpochId> {
        self.epoch
    }

    #[must_use]
    pub fn is_matched(&self, id: &ProgramId) -> bool {
        self.matched.contains(id)
    }

    /// Programs matched in the open epoch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.matched.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use emporia_types::MarketName;

    use super::*;

    fn id(epoch: u64, seq: u64) -> ProgramId {
        ProgramId::deterministic(&MarketName::new("M"), EpochId(epoch), seq)
    }

    #[test]
    fn second_match_blocked() {
        let mut guard = MatchGuard::new();
        guard.begin_epoch(EpochId(1)).unwrap();
        guard.mark_matched(id(1, 0)).unwrap();
        let err = guard.mark_matched(id(1, 0)).unwrap_err();
        assert!(matches!(err, EmporiaError::DuplicateProgram(p) if p == id(1, 0)));
    }

    #[test]
    fn new_epoch_forgets_old_programs() {
        let mut guard = MatchGuard::new();
        guard.begin_epoch(EpochId(1)).unwrap();
        guard.mark_matched(id(1, 0)).unwrap();
        guard.mark_matched(id(1, 1)).unwrap();
        guard.begin_epoch(EpochId(2)).unwrap();
        assert_eq!(guard.epoch(), Some(EpochId(2)));
        assert!(guard.is_empty());
        assert!(!guard.is_matched(&id(1, 0)));
        guard.mark_matched(id(2, 0)).unwrap();
        assert_eq!(guard.len(), 1);
    }

    #[test]
    fn replayed_or_older_epoch_refused() {
        let mut guard = MatchGuard::new();
        guard.begin_epoch(EpochId(5)).unwrap();
        assert!(matches!(
            guard.begin_epoch(EpochId(5)),
            Err(EmporiaError::EpochAlreadyMatched { epoch: EpochId(5), last: EpochId(5) })
        ));
        assert!(guard.begin_epoch(EpochId(3)).is_err());
        assert_eq!(guard.epoch(), Some(EpochId(5)));
        guard.begin_epoch(EpochId(6)).unwrap();
    }

    #[test]
    fn matching_needs_an_open_epoch() {
        let mut guard = MatchGuard::new();
        let err = guard.mark_matched(id(1, 0)).unwrap_err();
        assert!(matches!(err, EmporiaError::Internal(_)));
    }
}

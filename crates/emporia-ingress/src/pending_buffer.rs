//! Offer queue for the OFFERING phase.
//!
//! Admitted programs are pushed here together with their compiled code.
//! Programs rejected at admission are kept alongside so the round report
//! can list every submission. When Offering ends the buffer is sealed and
//! drained into the sealer.

use emporia_types::{EmporiaError, ExecutionResult, Program, Result, constants};
use emporia_vm::Code;

/// An admitted program ready for matching.
#[derive(Debug, Clone)]
pub struct QueuedProgram {
    pub program: Program,
    pub code: Code,
}

/// Collects the round's submissions in arrival order.
pub struct PendingBuffer {
    programs: Vec<QueuedProgram>,
    rejected: Vec<ExecutionResult>,
    /// Next submission sequence; shared by admitted and rejected programs.
    next_sequence: u64,
    sealed: bool,
    max_programs: usize,
}

impl PendingBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(constants::MAX_PROGRAMS_PER_ROUND)
    }

    /// Create a buffer that holds at most `max_programs` admitted programs.
    #[must_use]
    pub fn with_capacity(max_programs: usize) -> Self {
        Self {
            programs: Vec::new(),
            rejected: Vec::new(),
            next_sequence: 0,
            sealed: false,
            max_programs,
        }
    }

    /// Claim the next submission sequence number.
    ///
    /// # Errors
    /// Fails once the buffer is sealed.
    pub fn next_sequence(&mut self) -> Result<u64> {
        self.ensure_open()?;
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        Ok(sequence)
    }

    /// Queue an admitted program.
    ///
    /// # Errors
    /// - sealed buffer
    /// - `RoundFull` at capacity
    pub fn push(&mut self, queued: QueuedProgram) -> Result<()> {
        self.ensure_open()?;
        if self.programs.len() >= self.max_programs {
            return Err(EmporiaError::RoundFull {
                max: self.max_programs,
            });
        }
        self.programs.push(queued);
        Ok(())
    }

    /// Record a program turned away at admission.
    pub fn push_rejected(&mut self, result: ExecutionResult) -> Result<()> {
        self.ensure_open()?;
        self.rejected.push(result);
        Ok(())
    }

    /// Seal the buffer. Nothing can be added afterwards.
    pub fn seal(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.sealed = true;
        Ok(())
    }

    /// Take everything out of a sealed buffer.
    ///
    /// # Errors
    /// Fails if the buffer is not sealed.
    pub fn drain(&mut self) -> Result<(Vec<QueuedProgram>, Vec<ExecutionResult>)> {
        if !self.sealed {
            return Err(EmporiaError::Internal(
                "cannot drain an unsealed pending buffer".into(),
            ));
        }
        Ok((
            std::mem::take(&mut self.programs),
            std::mem::take(&mut self.rejected),
        ))
    }

    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Number of admitted programs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Number of programs rejected at admission.
    #[must_use]
    pub fn rejected_len(&self) -> usize {
        self.rejected.len()
    }

    /// Reset for a new round.
    pub fn reset(&mut self) {
        self.programs.clear();
        self.rejected.clear();
        self.next_sequence = 0;
        self.sealed = false;
    }

    fn ensure_open(&self) -> Result<()> {
        if self.sealed {
            return Err(EmporiaError::Internal("pending buffer already sealed".into()));
        }
        Ok(())
    }
}

impl Default for PendingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

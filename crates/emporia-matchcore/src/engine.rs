//! The matching engine.
//!
//! ```text
//! settle_round(SealedRound, &mut Ledger) -> MatchOutcome
//! ```
//!
//! ## Algorithm
//!
//! 1. **Execute**: run every admitted program, in submission order, against
//!    a snapshot of the ledger taken before anything is applied. Programs
//!    only see balances as they stood when the round was sealed.
//! 2. **Apply**: walk the programs again in the same order and apply each
//!    non-faulted program's intents one at a time. Every intent is
//!    re-checked against the live ledger, so an earlier program spending
//!    an account's holdings makes a later one's intent fail. A failed
//!    intent rejects its program but nothing is rolled back and matching
//!    continues.
//! 3. **Verify** supply conservation.
//!
//! Errors the engine does not expect (missing house account, overflow on
//! credit, a replayed epoch, a program matched twice, a supply mismatch)
//! stop processing.
//! Whatever was applied stays applied and the round is reported `partial`,
//! or `failed` if nothing was applied.

use emporia_ingress::SealedRound;
use emporia_ledger::Ledger;
use emporia_types::{
    EmporiaError, ErrorKind, ExecutionResult, IntentOutcome, IntentRecord, ProgramOutcome,
    RoundStatus, VmLimits,
};
use emporia_vm::OutputFilter;

use crate::determinism::compute_results_root;
use crate::guard::MatchGuard;

/// Everything one round of matching produced.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub status: RoundStatus,
    /// One result per submitted program (admitted or not), by sequence.
    pub results: Vec<ExecutionResult>,
    /// Copied from the sealed round.
    pub input_hash: [u8; 32],
    pub results_root: [u8; 32],
    /// Description of the internal fault that stopped matching, if any.
    pub fault: Option<String>,
    /// Intents that reached the ledger.
    pub applied_intents: usize,
}

/// Execute and apply one sealed round.
#[must_use]
pub fn settle_round(
    round: &SealedRound,
    ledger: &mut Ledger,
    guard: &mut MatchGuard,
    limits: &VmLimits,
    filter: &dyn OutputFilter,
) -> MatchOutcome {
    // Pass 1: execute against the sealed-time snapshot.
    let snapshot = ledger.snapshot();
    let mut executed: Vec<(ExecutionResult, Option<EmporiaError>)> = round
        .programs
        .iter()
        .map(|queued| {
            let program = &queued.program;
            let run = emporia_vm::run(&queued.code, &program.accounts, &snapshot, limits, filter);
            let fault = run.fault.map(EmporiaError::from);
            let result = ExecutionResult {
                program_id: program.id,
                sequence: program.sequence,
                submitter: program.submitter,
                outcome: fault
                    .as_ref()
                    .map_or(ProgramOutcome::Success, ProgramOutcome::faulted),
                intents: run
                    .intents
                    .into_iter()
                    .map(|intent| IntentRecord {
                        intent,
                        outcome: IntentOutcome::Skipped,
                    })
                    .collect(),
                deltas: Vec::new(),
                screen: run.screen,
                screen_truncated: run.screen_truncated,
                fuel_used: run.fuel_used,
            };
            (result, fault)
        })
        .collect();

    // Pass 2: apply in order.
    let mut applied_intents = 0usize;
    let mut fault: Option<EmporiaError> = guard.begin_epoch(round.epoch).err();
    let mut stopped_at = if fault.is_some() { 0 } else { executed.len() };

    'programs: for (index, (result, vm_fault)) in executed.iter_mut().enumerate() {
        if fault.is_some() {
            break;
        }
        if let Err(err) = guard.mark_matched(result.program_id) {
            fault = Some(err);
            stopped_at = index;
            break;
        }
        if let Some(vm_fault) = vm_fault {
            tracing::debug!(
                program = %result.program_id,
                sequence = result.sequence,
                kind = %vm_fault.kind(),
                "program faulted during execution"
            );
            continue;
        }
        for record in &mut result.intents {
            match ledger.apply_intent(&record.intent) {
                Ok(deltas) => {
                    record.outcome = IntentOutcome::Applied;
                    result.deltas.extend(deltas);
                    applied_intents += 1;
                }
                Err(err) if err.kind() == ErrorKind::InternalFault => {
                    fault = Some(err);
                    stopped_at = index;
                    break 'programs;
                }
                Err(err) => {
                    tracing::debug!(
                        program = %result.program_id,
                        sequence = result.sequence,
                        intent = %record.intent,
                        error = %err,
                        "intent rejected at apply time"
                    );
                    record.outcome = IntentOutcome::Rejected {
                        kind: err.kind(),
                        detail: err.to_string(),
                    };
                    if result.outcome.is_success() {
                        result.outcome = ProgramOutcome::rejected(&err);
                    }
                }
            }
        }
    }

    if fault.is_none() {
        if let Err(err) = ledger.verify_supply() {
            fault = Some(err);
        }
    }

    // Anything the fault cut off is reported as faulted; applied intents
    // keep their `Applied` outcome.
    if let Some(err) = &fault {
        tracing::error!(
            market = %round.market,
            epoch = round.epoch.0,
            error = %err,
            "internal fault during matching"
        );
        for (result, _) in executed.iter_mut().skip(stopped_at) {
            if !matches!(result.outcome, ProgramOutcome::Faulted { .. }) {
                result.outcome = ProgramOutcome::faulted(err);
            }
        }
    }

    let mut results: Vec<ExecutionResult> = executed
        .into_iter()
        .map(|(result, _)| result)
        .chain(round.rejected.iter().cloned())
        .collect();
    results.sort_by_key(|r| r.sequence);

    let results_root = match compute_results_root(&results) {
        Ok(root) => root,
        Err(err) => {
            fault.get_or_insert(err);
            [0u8; 32]
        }
    };

    let status = match (&fault, applied_intents) {
        (None, _) => RoundStatus::Complete,
        (Some(_), 0) => RoundStatus::Failed,
        (Some(_), _) => RoundStatus::Partial,
    };

    tracing::info!(
        market = %round.market,
        epoch = round.epoch.0,
        programs = results.len(),
        applied_intents,
        status = %status,
        "round matched"
    );

    MatchOutcome {
        status,
        results,
        input_hash: round.round_hash,
        results_root,
        fault: fault.map(|e| e.to_string()),
        applied_intents,
    }
}

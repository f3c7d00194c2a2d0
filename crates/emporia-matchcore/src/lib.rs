//! # emporia-matchcore
//!
//! **Deterministic matching engine for Emporia rounds.**
//!
//! Takes a [`SealedRound`](emporia_ingress::SealedRound) and the market's
//! ledger and produces one [`ExecutionResult`](emporia_types::ExecutionResult)
//! per submitted program:
//!
//! - **Strict order**: programs run and apply in submission sequence
//! - **Apply-time checks**: every intent is re-checked against the ledger
//!   as it stands after all earlier intents
//! - **Per-program isolation**: a failing program never stops its siblings
//! - **Deterministic output**: same input, same bytes, same `results_root`

pub mod determinism;
pub mod engine;
pub mod guard;

pub use determinism::{compute_results_root, verify_results_root};
pub use engine::{MatchOutcome, settle_round};
pub use guard::MatchGuard;

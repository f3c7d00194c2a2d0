//! # emporia-types
//!
//! Shared types, errors, and configuration for the **Emporia** round
//! orchestrator.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`MarketName`], [`EpochId`], [`TraderId`], [`AccountId`], [`ProgramId`]
//! - **Ledger model**: [`Account`], [`LedgerView`], [`LedgerDelta`], [`LedgerKey`]
//! - **Program model**: [`Program`], [`ProgramSubmission`], [`Delegation`]
//! - **Intent model**: [`Intent`], [`IntentSide`]
//! - **Result model**: [`ExecutionResult`], [`ProgramOutcome`], [`IntentRecord`]
//! - **Round model**: [`RoundPhase`], [`RoundStatus`], [`EnterReceipt`], [`OfferReceipt`], [`RoundReport`]
//! - **Configuration**: [`EmporiaConfig`], [`MarketConfig`], [`RoundTiming`], [`VmLimits`]
//! - **Errors**: [`EmporiaError`] with `EM_ERR_` prefix codes and [`ErrorKind`]
//! - **Constants**: system-wide limits and defaults

pub mod account;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod intent;
pub mod program;
pub mod result;
pub mod round;

// Re-export all primary types at crate root for ergonomic imports:
//   use emporia_types::{Program, Intent, ExecutionResult, ...};

pub use account::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use intent::*;
pub use program::*;
pub use result::*;
pub use round::*;

// Constants are accessed via `emporia_types::constants::FOO`
// (not re-exported to avoid name collisions).

//! # emporia-round
//!
//! **Round lifecycle for Emporia markets.**
//!
//! Every configured market gets its own [`RoundStateMachine`], owned by a
//! single tokio task (see [`scheduler`]). The task ticks the machine through
//!
//! ```text
//! IDLE → ENTERING → OFFERING → MATCHING → LEAVING → IDLE
//! ```
//!
//! and serializes every external call through a bounded command queue, so a
//! market's ledger has exactly one writer. Markets never share state.
//!
//! The [`MarketRegistry`] is the entry point: build it from an
//! [`EmporiaConfig`](emporia_types::EmporiaConfig), route calls by market
//! name, and shut it down explicitly.

pub mod redaction;
pub mod registry;
pub mod scheduler;
pub mod state_machine;
pub mod telemetry;

pub use redaction::Redactor;
pub use registry::MarketRegistry;
pub use scheduler::{Command, MarketHandle};
pub use state_machine::{MarketSnapshot, Participant, RoundStateMachine};

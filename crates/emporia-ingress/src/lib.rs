//! # emporia-ingress
//!
//! Everything between an OFFER call and the matching engine.
//!
//! ## Program Flow
//!
//! ```text
//! OFFER → AdmissionControl.open_batch()
//!       → per program: AdmissionControl.check_program() → compile()
//!                      → AuthorizationValidator.authorize() → AdmissionControl.reserve()
//!                      → PendingBuffer.push()
//!       → (Offering ends) PendingBuffer.seal() → BatchSealer.seal() → SealedRound
//! ```
//!
//! A program that fails any per-program step is recorded as a rejected
//! result and never reaches the ledger. Its siblings are unaffected.

pub mod admission;
pub mod authorization;
pub mod batch_sealer;
pub mod pending_buffer;

pub use admission::AdmissionControl;
pub use authorization::{AuthorizationValidator, verify_delegation};
pub use batch_sealer::{BatchSealer, SealedRound};
pub use pending_buffer::{PendingBuffer, QueuedProgram};

//! Reimbursement claims for z-imburse holders.
//!
//! A claim is a commit/reveal exchange with two contracts. The escrow pays a
//! verified receipt into a pending shield note committed to `hash(secret)`;
//! revealing `secret` to the token contract moves the amount into the
//! holder's private balance. [`ClaimOrchestrator`] runs that exchange as an
//! explicit state machine and keeps a history of attempts.
//!
//! [`EntitlementDirectory`] lists what the holder may claim and what they hold.

pub mod backend;
pub mod directory;
pub mod error;
pub mod orchestrator;
pub mod secret;
pub mod stage;

pub use backend::{CircuitInputs, ClaimSubmission, ClaimSubmitter, DeferredLengths, RegistryLedger, TokenLedger};
pub use directory::{EntitlementDirectory, EntitlementView, EscrowSummary};
pub use error::{ClaimError, Result};
pub use orchestrator::{ClaimOrchestrator, ClaimReceipt};
pub use secret::{generate_secret, ClaimSecret};
pub use stage::{ClaimAttempt, ClaimStage, StageTransition};

//! Note/nullifier reconciliation for z-imburse holders.
//!
//! When a counterparty nullifies its copy of an entitlement, the escrow emits
//! an event carrying the note's entropy. The holder's copy stays live until
//! the holder nullifies it too. A reconciliation pass:
//!
//! 1. Reads `EntitlementNullified` events over a bounded block window
//! 2. Matches their entropies against the holder's entitlement notes
//! 3. Groups matches by escrow contract
//! 4. Submits zero-padded `nullify_entitlements` calls in sequential waves
//!
//! Passes are idempotent; a failed pass is retried by running the next one.

pub mod error;
pub mod ledger;
pub mod locks;
pub mod reconciler;
pub mod scanner;
pub mod scheduler;

pub use error::{ReconcileError, ReconciliationError, Result};
pub use ledger::{EventKind, NoteLedger, NullifyRequest, NullifySubmitter, MAX_CALLS_PER_WAVE, NULLIFY_SLOTS};
pub use locks::{ContractGuard, ContractLocks};
pub use reconciler::{ReconcileReport, Reconciler};
pub use scanner::{
    match_notes, MatchedGroup, NoteInventoryScanner, ScannerConfig, ENTITLEMENT_ENTROPY_INDEX,
    EVENT_BLOCK_LIMIT,
};
pub use scheduler::{build_requests, plan_waves, slice_entropies, BatchScheduler, ScheduleOutcome, Wave};

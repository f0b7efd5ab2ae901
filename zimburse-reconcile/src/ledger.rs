//! Ledger seams used by the reconciliation pass.
//!
//! The ledger (private execution environment plus node) owns note storage,
//! the event log and transaction submission. These traits are the only way
//! this crate touches it; implementations are injected.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zimburse_common::{Address, EncryptedNote, Field, LedgerError, NullificationEvent, TxReceipt};

/// Entropy slots taken by one `nullify_entitlements` call. The escrow
/// contract's entry point has a fixed-size array parameter of this width.
pub const NULLIFY_SLOTS: usize = 10;

/// Calls the account contract accepts in one batched transaction.
pub const MAX_CALLS_PER_WAVE: usize = 4;

/// Events this crate reads from the log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Emitted by an escrow when a counterparty nullifies its entitlement copy.
    EntitlementNullified,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::EntitlementNullified => "EntitlementNullified",
        }
    }
}

/// Read side of the ledger.
#[async_trait]
pub trait NoteLedger: Send + Sync {
    /// Events of `kind` visible to the holder in `[from_block, to_block]`.
    async fn events(
        &self,
        kind: EventKind,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<NullificationEvent>, LedgerError>;

    /// Incoming notes scoped to `scope`.
    async fn incoming_notes(&self, scope: &Address) -> Result<Vec<EncryptedNote>, LedgerError>;
}

/// One `nullify_entitlements` call against an escrow contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NullifyRequest {
    pub contract: Address,
    /// Real entropies first, then [`Field::ZERO`] sentinels.
    pub entropies: [Field; NULLIFY_SLOTS],
}

impl NullifyRequest {
    /// Entropies that are not padding.
    pub fn real_entropies(&self) -> impl Iterator<Item = &Field> {
        self.entropies.iter().filter(|entropy| !entropy.is_zero())
    }
}

/// Write side of the ledger for nullification.
#[async_trait]
pub trait NullifySubmitter: Send + Sync {
    /// Submit up to [`MAX_CALLS_PER_WAVE`] calls as one atomic batch and wait
    /// for the receipt.
    async fn submit_wave(&self, calls: &[NullifyRequest]) -> Result<TxReceipt, LedgerError>;
}
